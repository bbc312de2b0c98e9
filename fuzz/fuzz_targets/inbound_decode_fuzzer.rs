//! Fuzz target for relay frame decoding
//!
//! # Strategy
//!
//! - Random text: arbitrary bytes decoded lossily as UTF-8
//! - Deep nesting: arrays/objects nested to arbitrary depth
//! - Known types: `send`/`user-joined`/`user-left` objects with mangled fields
//! - Roster shapes: bare arrays and `users` objects with mangled entries
//!
//! # Invariants
//!
//! - Decoding NEVER panics, whatever the input
//! - Anything that decodes re-encodes, and decodes to the same event

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_proto::{InboundEvent, OutboundEvent};

#[derive(Debug, Clone, Arbitrary)]
enum FrameAttack {
    RandomText { bytes: Vec<u8> },
    DeeplyNested { depth: u8, object: bool },
    Typed { kind: KnownType, body: Vec<(Field, Value)> },
    Roster { wrapped: bool, entries: Vec<Vec<(Field, Value)>> },
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum KnownType {
    Send,
    UserJoined,
    UserLeft,
    Exit,
    Missing,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Field {
    Id,
    Name,
    Message,
    User,
    TempId,
    Users,
    Other,
}

#[derive(Debug, Clone, Arbitrary)]
enum Value {
    Null,
    Bool(bool),
    Number(i64),
    Text(String),
    User { id: String, name: String },
    Empty,
}

fuzz_target!(|attack: FrameAttack| {
    let raw = render(&attack);

    if let Ok(event) = InboundEvent::decode(&raw) {
        let encoded = event.encode().expect("decoded events must re-encode");
        let again = InboundEvent::decode(&encoded).expect("re-encoded events must decode");
        assert_eq!(again, event, "round trip changed {raw}");
    }

    // The relay-side decoder must be just as robust.
    let _ = OutboundEvent::decode(&raw);
});

fn render(attack: &FrameAttack) -> String {
    match attack {
        FrameAttack::RandomText { bytes } => String::from_utf8_lossy(bytes).into_owned(),
        FrameAttack::DeeplyNested { depth, object } => {
            let depth = usize::from(*depth);
            let (open, close) = if *object { (r#"{"users":"#, "}") } else { ("[", "]") };
            format!("{}null{}", open.repeat(depth), close.repeat(depth))
        }
        FrameAttack::Typed { kind, body } => {
            let mut fields: Vec<String> = body.iter().map(|(f, v)| entry(*f, v)).collect();
            let kind = match kind {
                KnownType::Send => Some("send"),
                KnownType::UserJoined => Some("user-joined"),
                KnownType::UserLeft => Some("user-left"),
                KnownType::Exit => Some("exit"),
                KnownType::Missing => None,
            };
            if let Some(kind) = kind {
                fields.push(format!(r#""type":"{kind}""#));
            }
            format!("{{{}}}", fields.join(","))
        }
        FrameAttack::Roster { wrapped, entries } => {
            let users: Vec<String> = entries
                .iter()
                .map(|entry_fields| {
                    let fields: Vec<String> =
                        entry_fields.iter().map(|(f, v)| entry(*f, v)).collect();
                    format!("{{{}}}", fields.join(","))
                })
                .collect();
            let array = format!("[{}]", users.join(","));
            if *wrapped {
                format!(r#"{{"users":{array}}}"#)
            } else {
                array
            }
        }
    }
}

fn entry(field: Field, value: &Value) -> String {
    let key = match field {
        Field::Id => "id",
        Field::Name => "name",
        Field::Message => "message",
        Field::User => "user",
        Field::TempId => "tempId",
        Field::Users => "users",
        Field::Other => "x",
    };
    format!("{}:{}", quote(key), json(value))
}

fn json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Text(s) => quote(s),
        Value::User { id, name } => format!(r#"{{"id":{},"name":{}}}"#, quote(id), quote(name)),
        Value::Empty => "{}".to_owned(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
