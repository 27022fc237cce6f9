use log::warn;
use mlua::{
    Function, Lua, LuaOptions, MultiValue, RegistryKey, StdLib, Thread, ThreadStatus, Value,
};
use wayfarer_core::{ReportSeverity, ScriptError, ScriptExternals, ScriptInterpreter};

/// Lua convenience layer handed to every dialogue script. `say` yields
/// one raw line, `mark` tags the next line, `ask` yields a choice menu
/// and resumes with the 1-based pick.
const PRELUDE: &str = r#"
function say(text)
    coroutine.yield("line", text)
end

function mark(tag)
    coroutine.yield("tag", tag)
end

function ask(...)
    return coroutine.yield("menu", ...)
end
"#;

/// The interpreter step buffered one ahead, so `can_continue` and
/// `current_choices` stay pure queries over an already-resolved state.
enum Buffered {
    Line { text: String, tags: Vec<String> },
    Menu(Vec<String>),
    Done,
}

/// Narrative-script interpreter backed by an embedded Lua VM. Every
/// global function of the loaded chunk is a jumpable dialogue path,
/// driven as a coroutine; `Event`, `Get_State` and `Add_State` call the
/// bound externals from inside the script.
pub struct LuaInterpreter {
    lua: Lua,
    externals: Option<ScriptExternals>,
    thread_key: Option<RegistryKey>,
    buffered: Buffered,
    current_tags: Vec<String>,
    /// Pending choice answer, consumed by the next resume.
    resume_arg: Option<i64>,
}

impl LuaInterpreter {
    pub fn new() -> Result<Self, ScriptError> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
            .map_err(|err| ScriptError::Load(err.to_string()))?;
        lua.load(PRELUDE)
            .set_name("dialogue prelude")
            .exec()
            .map_err(|err| ScriptError::Load(err.to_string()))?;
        Ok(LuaInterpreter {
            lua,
            externals: None,
            thread_key: None,
            buffered: Buffered::Done,
            current_tags: Vec::new(),
            resume_arg: None,
        })
    }

    fn report(&self, message: &str, severity: ReportSeverity) {
        match &self.externals {
            Some(externals) => externals.report(message, severity),
            None => warn!("lua host: {message}"),
        }
    }

    /// Resumes the active coroutine until it yields the next line or
    /// menu, or finishes. Tag yields accumulate onto the line that
    /// follows them. A Lua runtime error ends the script, never the
    /// process.
    fn pump(&mut self) {
        let mut tags = Vec::new();
        let key = match self.thread_key.as_ref() {
            Some(key) => key,
            None => {
                self.buffered = Buffered::Done;
                return;
            }
        };
        let thread: Thread = match self.lua.registry_value(key) {
            Ok(thread) => thread,
            Err(err) => {
                self.report(&format!("lost dialogue thread: {err}"), ReportSeverity::Error);
                self.buffered = Buffered::Done;
                return;
            }
        };

        loop {
            if !matches!(thread.status(), ThreadStatus::Resumable) {
                self.buffered = Buffered::Done;
                return;
            }
            let resumed = match self.resume_arg.take() {
                Some(answer) => thread.resume::<_, MultiValue>(answer),
                None => thread.resume::<_, MultiValue>(()),
            };
            let values = match resumed {
                Ok(values) => values,
                Err(err) => {
                    self.report(&err.to_string(), ReportSeverity::Error);
                    self.buffered = Buffered::Done;
                    return;
                }
            };
            if !matches!(thread.status(), ThreadStatus::Resumable) {
                self.buffered = Buffered::Done;
                return;
            }

            let mut iter = values.into_iter();
            let kind = iter.next().and_then(|value| value_to_string(&value));
            match kind.as_deref() {
                Some("line") => {
                    let text = iter
                        .next()
                        .and_then(|value| value_to_string(&value))
                        .unwrap_or_default();
                    self.buffered = Buffered::Line { text, tags };
                    return;
                }
                Some("tag") => {
                    if let Some(tag) = iter.next().and_then(|value| value_to_string(&value)) {
                        tags.push(tag);
                    }
                }
                Some("menu") => {
                    let options: Vec<String> = iter
                        .filter_map(|value| value_to_string(&value))
                        .collect();
                    if options.is_empty() {
                        self.report("menu yield with no options", ReportSeverity::Warning);
                        continue;
                    }
                    self.buffered = Buffered::Menu(options);
                    return;
                }
                other => {
                    self.report(
                        &format!("unrecognized yield {other:?} from dialogue script"),
                        ReportSeverity::Warning,
                    );
                }
            }
        }
    }
}

impl ScriptInterpreter for LuaInterpreter {
    fn load_script(&mut self, source: &[u8]) -> Result<(), ScriptError> {
        let text =
            std::str::from_utf8(source).map_err(|err| ScriptError::Load(err.to_string()))?;
        self.lua
            .load(text)
            .set_name("dialogue script")
            .exec()
            .map_err(|err| ScriptError::Load(err.to_string()))?;
        Ok(())
    }

    fn jump_to(&mut self, path: &str) -> Result<(), ScriptError> {
        let entry: Function = self
            .lua
            .globals()
            .get(path)
            .map_err(|_| ScriptError::UnknownPath(path.to_string()))?;
        let thread = self
            .lua
            .create_thread(entry)
            .map_err(|err| ScriptError::Runtime(err.to_string()))?;
        if let Some(stale) = self.thread_key.take() {
            let _ = self.lua.remove_registry_value(stale);
        }
        self.thread_key = Some(
            self.lua
                .create_registry_value(thread)
                .map_err(|err| ScriptError::Runtime(err.to_string()))?,
        );
        self.resume_arg = None;
        self.current_tags.clear();
        self.pump();
        Ok(())
    }

    fn can_continue(&self) -> bool {
        matches!(self.buffered, Buffered::Line { .. })
    }

    fn continue_line(&mut self) -> String {
        match std::mem::replace(&mut self.buffered, Buffered::Done) {
            Buffered::Line { text, tags } => {
                self.current_tags = tags;
                self.pump();
                text
            }
            other => {
                self.buffered = other;
                self.report(
                    "continue_line called without a pending line",
                    ReportSeverity::Warning,
                );
                String::new()
            }
        }
    }

    fn current_choices(&self) -> Vec<String> {
        match &self.buffered {
            Buffered::Menu(options) => options.clone(),
            _ => Vec::new(),
        }
    }

    fn choose_choice(&mut self, index: usize) {
        let accepted = match &self.buffered {
            Buffered::Menu(options) if index < options.len() => true,
            Buffered::Menu(options) => {
                self.report(
                    &format!("choice {index} out of range ({} offered)", options.len()),
                    ReportSeverity::Warning,
                );
                false
            }
            _ => {
                self.report(
                    &format!("choice {index} submitted with no menu pending"),
                    ReportSeverity::Warning,
                );
                false
            }
        };
        if accepted {
            // Dialogue scripts see 1-based picks, Lua convention.
            self.resume_arg = Some(index as i64 + 1);
            self.buffered = Buffered::Done;
            self.pump();
        }
    }

    fn current_tags(&self) -> Vec<String> {
        self.current_tags.clone()
    }

    fn bind_externals(&mut self, externals: ScriptExternals) {
        if let Err(err) = install_externals(&self.lua, externals.clone()) {
            externals.report(
                &format!("failed to install script externals: {err}"),
                ReportSeverity::Error,
            );
        }
        self.externals = Some(externals);
    }
}

fn install_externals(lua: &Lua, externals: ScriptExternals) -> mlua::Result<()> {
    let globals = lua.globals();

    let event_externals = externals.clone();
    globals.set(
        "Event",
        lua.create_function(move |_, name: String| {
            event_externals.raise_event(&name);
            Ok(())
        })?,
    )?;

    let get_externals = externals.clone();
    globals.set(
        "Get_State",
        lua.create_function(move |_, id: String| Ok(get_externals.state_amount(&id)))?,
    )?;

    let add_externals = externals;
    globals.set(
        "Add_State",
        lua.create_function(move |_, (id, amount): (String, i64)| {
            add_externals.add_state(&id, amount);
            Ok(())
        })?,
    )?;

    Ok(())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => text.to_str().ok().map(|text| text.to_string()),
        Value::Integer(number) => Some(number.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
