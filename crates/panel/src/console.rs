//! Line-oriented serial console.
//!
//! One command per line. Replies use CR/LF line endings as on the UART.
//! Lines starting with `{` are JSON fragments: `{}` reads every entity in
//! the device tree, `{"eID":...}` reads one entity and `{"eID":...,"v":[...]}`
//! writes it. A line starting with `[` is an array of fragments.

use std::sync::Arc;

use tracing::{debug, warn};
use wildmatch::WildMatch;

use snon::{Fragment, SharedStore, decode_bulk, decode_fragment, is_bulk_read};

use crate::clock::{self, Clock};
use crate::profiles::DEVICE_TIME;

const HELP: &[(&str, &str)] = &[
    ("help", "Displays list of commands"),
    ("clear", "Clear the serial terminal"),
    ("ls [pattern]", "List SNON entities, optionally filtered by name"),
    ("cat <entity>", "Display the value of an SNON entity"),
    ("dump", "Display every SNON entity"),
    ("get time", "Get the current time"),
    ("set time <time>", "Set the current time (YYYY-MM-DDTHH:MM:SSZ)"),
    ("{}", "Read every entity in the device tree"),
    ("{\"eID\":...}", "Read or write one entity"),
];

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const EMPTY_OBJECT: &str = "{}";

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Empty,
    Help,
    Clear,
    List(Option<&'a str>),
    Cat(&'a str),
    Dump,
    GetTime,
    SetTime(&'a str),
    BulkRead,
    Fragment(&'a str),
    BulkWrite(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return Command::Empty;
        }
        if trimmed.starts_with('{') {
            if is_bulk_read(trimmed) {
                return Command::BulkRead;
            }
            return Command::Fragment(trimmed);
        }
        if trimmed.starts_with('[') {
            return Command::BulkWrite(trimmed);
        }

        match trimmed {
            "help" => Command::Help,
            "clear" => Command::Clear,
            "ls" => Command::List(None),
            "dump" => Command::Dump,
            "get time" => Command::GetTime,
            _ => {
                if let Some(pattern) = trimmed.strip_prefix("ls ") {
                    Command::List(Some(pattern.trim()))
                } else if let Some(name) = trimmed.strip_prefix("cat ") {
                    Command::Cat(name.trim())
                } else if let Some(time) = trimmed.strip_prefix("set time ") {
                    Command::SetTime(time)
                } else {
                    Command::Unknown(trimmed)
                }
            }
        }
    }
}

/// Text to send back, and whether the display needs a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub refresh: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            refresh: false,
        }
    }

    fn written(text: impl Into<String>, refresh: bool) -> Self {
        Self {
            text: text.into(),
            refresh,
        }
    }
}

/// Console command handler over the shared store.
#[derive(Debug, Clone)]
pub struct Console {
    store: SharedStore,
    clock: Arc<Clock>,
}

impl Console {
    pub fn new(store: SharedStore, clock: Arc<Clock>) -> Self {
        Self { store, clock }
    }

    /// Handle one received line.
    pub fn handle_line(&self, line: &str) -> Reply {
        let command = Command::parse(line);
        debug!("Received command {:?}", command);

        match command {
            Command::Empty => Reply::text("\r\n"),
            Command::Help => Reply::text(self.help()),
            Command::Clear => Reply::text(CLEAR_SCREEN),
            Command::List(pattern) => Reply::text(self.list(pattern)),
            Command::Cat(key) => Reply::text(self.cat(key)),
            Command::Dump => Reply::text(self.dump()),
            Command::GetTime => Reply::text(self.get_time()),
            Command::SetTime(text) => self.set_time(text),
            Command::BulkRead => Reply::text(self.bulk_read()),
            Command::Fragment(text) => self.fragment(text),
            Command::BulkWrite(text) => self.bulk_write(text),
            Command::Unknown(_) => Reply::text("\r\nUnknown command\r\n"),
        }
    }

    fn help(&self) -> String {
        let mut out = String::from("\r\nCommands:");
        for (command, description) in HELP {
            let quoted = format!("\"{}\"", command);
            out.push_str(&format!("\r\n{:<22}- {}", quoted, description));
        }
        out.push_str("\r\n");
        out
    }

    /// `<eID> - <name>` per entity in the device tree.
    fn list(&self, pattern: Option<&str>) -> String {
        let matcher = pattern.map(WildMatch::new);
        let lines: Vec<String> = self
            .store
            .entities_listing()
            .into_iter()
            .filter_map(|eid| {
                let name = self.store.name_of(eid).ok();
                if let Some(matcher) = &matcher {
                    if !name.as_deref().is_some_and(|name| matcher.matches(name)) {
                        return None;
                    }
                }
                Some(format!(
                    "{} - {}",
                    eid,
                    name.as_deref().unwrap_or("Unknown entity name")
                ))
            })
            .collect();

        format!("\r\n{}\r\n", lines.join("\r\n"))
    }

    /// The entity's encoding with a line break after every comma.
    fn cat(&self, key: &str) -> String {
        match self.store.encode_entity(key) {
            Ok(json) => format!("\r\n{}\r\n", json.replace(',', ",\r\n")),
            Err(e) => {
                debug!("cat {}: {}", key, e);
                "\r\nEntity not found\r\n".to_string()
            }
        }
    }

    fn dump(&self) -> String {
        match self.store.encode_dump() {
            Ok(json) => format!("\r\n{}\r\n", json),
            Err(e) => format!("\r\nError: {}\r\n", e),
        }
    }

    fn get_time(&self) -> String {
        match self.clock.now() {
            Some(now) => format!("\r\nThe time is: {}", clock::format_time(now)),
            None => "\r\nRTC not running. Use the \"set time\" command to set the current time."
                .to_string(),
        }
    }

    fn set_time(&self, text: &str) -> Reply {
        match clock::parse_time(text) {
            Ok(time) => {
                self.clock.set(time);
                let formatted = clock::format_time(time);
                if let Err(e) = self.store.set_value(DEVICE_TIME, formatted.as_str()) {
                    warn!("Failed to update {}: {}", DEVICE_TIME, e);
                }
                Reply::written(format!("\r\nTime set to {}", formatted), true)
            }
            Err(e) => Reply::text(format!("\r\n{}", e)),
        }
    }

    fn bulk_read(&self) -> String {
        match self.store.encode_bulk_read() {
            Ok(json) => format!("{}\r\n", json),
            Err(e) => {
                warn!("Bulk read failed: {}", e);
                "[]\r\n".to_string()
            }
        }
    }

    fn fragment(&self, text: &str) -> Reply {
        let (echo, written) = match decode_fragment(text) {
            Ok(fragment) => self.apply(&fragment),
            Err(e) => {
                debug!("Unable to find eID: {}", e);
                (EMPTY_OBJECT.to_string(), false)
            }
        };
        Reply::written(format!("{}\r\n", echo), written)
    }

    fn bulk_write(&self, text: &str) -> Reply {
        let fragments = match decode_bulk(text) {
            Ok(fragments) => fragments,
            Err(e) => {
                debug!("Malformed bulk fragment: {}", e);
                return Reply::text("[]\r\n".to_string());
            }
        };

        let mut refresh = false;
        let echoes: Vec<String> = fragments
            .iter()
            .map(|fragment| {
                let (echo, written) = self.apply(fragment);
                refresh |= written;
                echo
            })
            .collect();
        Reply::written(format!("[{}]\r\n", echoes.join(",")), refresh)
    }

    /// Apply a fragment and return the entity's encoding and whether values
    /// were written.
    fn apply(&self, fragment: &Fragment) -> (String, bool) {
        let mut written = false;
        if let Some(values) = &fragment.values {
            match self.store.set_values(&fragment.id, values.clone()) {
                Ok(_) => written = true,
                Err(e) if e.is_not_found() => {
                    debug!("Unable to find entity with eID {}", fragment.id);
                    return (EMPTY_OBJECT.to_string(), false);
                }
                Err(e) => warn!("Rejected write to {}: {}", fragment.id, e),
            }
        }

        match self.store.encode_entity(&fragment.id) {
            Ok(json) => (json, written),
            Err(_) => {
                debug!("Unable to find entity with eID {}", fragment.id);
                (EMPTY_OBJECT.to_string(), written)
            }
        }
    }
}
