//! The REPL's line protocol.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Status,
    Toggle(String),
    Volume(String, i64),
    Restart(String),
    Unlock,
    StopAll,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("list" | "ls", []) => Command::List,
            ("status", []) => Command::Status,
            ("toggle" | "t", [id]) => Command::Toggle(id.to_string()),
            ("volume" | "vol", [id, value]) => {
                let value = value
                    .parse()
                    .map_err(|_| format!("volume must be a number, got '{value}'"))?;
                Command::Volume(id.to_string(), value)
            }
            ("restart", [id]) => Command::Restart(id.to_string()),
            ("unlock", []) => Command::Unlock,
            ("stop-all", []) => Command::StopAll,
            ("quit" | "exit" | "q", []) => Command::Quit,
            ("toggle" | "t" | "restart", _) => return Err(format!("usage: {verb} <track>")),
            ("volume" | "vol", _) => return Err(format!("usage: {verb} <track> <0-100>")),
            _ => return Err(format!("unknown command '{}'", line.trim())),
        };
        Ok(Some(command))
    }
}
