//! Log line classification.
//!
//! The game's log grammar is only partially known, so lines are matched by
//! marker substrings rather than parsed. Room markers live in a rule table;
//! adding a room format means adding a [`MarkerRule`].

use std::collections::BTreeMap;

use roomscan_protocol::{RoomEvent, ServerEndpoint};

/// How the room identifier is taken from a line that contains a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// The characters right after the marker, up to the next whitespace.
    /// Later `key=value` tokens become structured fields.
    FollowingToken,
    /// The last whitespace-separated token of the line.
    LastToken,
}

/// One entry of the room marker catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRule {
    pub marker: String,
    /// Compare the marker ASCII case-insensitively.
    pub ignore_case: bool,
    pub extract: Extract,
}

impl MarkerRule {
    pub fn new(marker: impl Into<String>, ignore_case: bool, extract: Extract) -> Self {
        Self {
            marker: marker.into(),
            ignore_case,
            extract,
        }
    }

    /// Byte offset just past the marker, if the line contains it.
    fn find_end(&self, line: &str) -> Option<usize> {
        let start = if self.ignore_case {
            line.to_ascii_lowercase()
                .find(&self.marker.to_ascii_lowercase())?
        } else {
            line.find(&self.marker)?
        };
        Some(start + self.marker.len())
    }
}

/// Everything the scanner reacts to in a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSignal {
    Room(RoomEvent),
    Server(ServerEndpoint),
    Disconnected,
}

const SERVER_MARKER: &str = "udmux";
const DISCONNECT_MARKER: &str = "[flog::network] client:disconnect";

/// Stateless line classifier backed by a marker rule table.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    rules: Vec<MarkerRule>,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::with_rules(vec![
            MarkerRule::new("ENTERED_ROOM:", false, Extract::FollowingToken),
            MarkerRule::new("room name", true, Extract::LastToken),
        ])
    }
}

impl LineClassifier {
    pub fn with_rules(rules: Vec<MarkerRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MarkerRule] {
        &self.rules
    }

    /// Extracts a room event from `line`, stamped with `detected_at`
    /// (milliseconds since the Unix epoch). The first matching rule wins.
    pub fn classify(&self, line: &str, detected_at: i64) -> Option<RoomEvent> {
        self.rules.iter().find_map(|rule| {
            let end = rule.find_end(line)?;
            let (room, fields) = match rule.extract {
                Extract::FollowingToken => following_token(&line[end..]),
                Extract::LastToken => (line.split_whitespace().next_back()?, BTreeMap::new()),
            };
            let room = clean_token(room);
            if room.is_empty() {
                return None;
            }
            Some(RoomEvent {
                room: room.to_string(),
                timestamp: detected_at,
                line: line.to_string(),
                fields,
            })
        })
    }

    /// Every signal `line` carries, checked independently, in the order
    /// room, disconnect, server.
    pub fn signals(&self, line: &str, detected_at: i64) -> Vec<LogSignal> {
        let mut found = Vec::new();
        if let Some(event) = self.classify(line, detected_at) {
            found.push(LogSignal::Room(event));
        }
        let lower = line.to_ascii_lowercase();
        if lower.contains(DISCONNECT_MARKER) {
            found.push(LogSignal::Disconnected);
        }
        if lower.contains(SERVER_MARKER)
            && let Some(endpoint) = server_endpoint(line)
        {
            found.push(LogSignal::Server(endpoint));
        }
        found
    }

    /// The first of [`LineClassifier::signals`].
    pub fn signal(&self, line: &str, detected_at: i64) -> Option<LogSignal> {
        self.signals(line, detected_at).into_iter().next()
    }
}

fn following_token(rest: &str) -> (&str, BTreeMap<String, String>) {
    let mut tokens = rest.split_whitespace();
    // A marker followed by whitespace carries no room id.
    let room = if rest.starts_with(char::is_whitespace) {
        ""
    } else {
        tokens.next().unwrap_or("")
    };
    let fields = tokens
        .filter_map(|token| {
            let (key, value) = token.split_once('=')?;
            let valid_key =
                !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            valid_key.then(|| (key.to_string(), clean_token(value).to_string()))
        })
        .collect();
    (room, fields)
}

/// Strips quoting, separators and decoding debris around a token.
fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| {
        matches!(c, '"' | '\'' | ',' | ';' | '.' | '\u{fffd}') || c.is_control()
    })
}

/// Parses `... UDMUX Address = <host>, Port = <port> ...`.
fn server_endpoint(line: &str) -> Option<ServerEndpoint> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let at = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case(SERVER_MARKER))?;
    let raw = clean_token(tokens.get(at + 3)?);
    if raw.is_empty() {
        return None;
    }

    // `host:port` in one token, unless it is an IPv6 literal.
    if raw.matches(':').count() == 1
        && let Some((host, port)) = raw.split_once(':')
        && let Ok(port) = port.parse()
    {
        return Some(ServerEndpoint {
            host: host.to_string(),
            port: Some(port),
        });
    }

    let port = match tokens.get(at + 4..at + 7) {
        Some([key, "=", value]) if key.eq_ignore_ascii_case("port") => {
            clean_token(value).parse().ok()
        }
        _ => None,
    };
    Some(ServerEndpoint {
        host: raw.to_string(),
        port,
    })
}
