//! Demonstration services for the two channels.
//!
//! [`InfoService`] speaks the RPC channel: two trivial queries and a record
//! mutation that makes the copy-not-share semantics of the boundary visible.
//! [`RosterService`] speaks the messenger channel: envelope in, reply
//! envelope out, plus announcements pushed to registered watchers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tetherrpc::FailureReason;
use tetherrpc::Value;

use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::message::Message;
use crate::message::Peer;
use crate::message::ReplyAddress;
use crate::service::Service;

/// Registry name of the [`InfoService`] demo.
pub const INFO_SERVICE: &str = "tether.demo.Info";
/// Registry name of the [`RosterService`] demo.
pub const ROSTER_SERVICE: &str = "tether.demo.Roster";

/// The demonstration payload record.
///
/// Crossed by value: a service mutates its own decoded copy, and the caller
/// sees the mutation only in the returned record, never in the instance it
/// passed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Student {
    pub name: String,
    pub age: i32,
    pub grade: String,
}

impl Student {
    /// Marshals the record into a name-keyed value.
    pub fn to_value(&self) -> Value {
        Value::Record(vec![
            ("name".into(), Value::Str(self.name.clone())),
            ("age".into(), Value::I32(self.age)),
            ("grade".into(), Value::Str(self.grade.clone())),
        ])
    }

    /// Unmarshals a record value, ignoring fields it does not know.
    pub fn from_value(value: &Value) -> std::result::Result<Self, tetherrpc::Error> {
        let fields = value
            .as_record()
            .ok_or_else(|| tetherrpc::Error::TypeMismatch {
                expected: "record".into(),
                found: value.kind().into(),
            })?;

        let mut name = None;
        let mut age = None;
        let mut grade = None;
        for (key, val) in fields {
            match key.as_str() {
                "name" => name = val.as_str().map(str::to_string),
                "age" => age = val.as_i32(),
                "grade" => grade = val.as_str().map(str::to_string),
                _ => {}
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| tetherrpc::Error::MissingField("name".into()))?,
            age: age.ok_or_else(|| tetherrpc::Error::MissingField("age".into()))?,
            grade: grade.ok_or_else(|| tetherrpc::Error::MissingField("grade".into()))?,
        })
    }
}

/// The grade a student of the given age belongs to.
fn grade_for(age: i32) -> String {
    format!("Grade {}", age / 6 + 1)
}

/// RPC demo service: `add`, `get_message`, `get_student_info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoService;

#[async_trait::async_trait]
impl Service for InfoService {
    async fn call(
        &self,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Value, FailureReason> {
        match method {
            "add" => {
                let [a, b] = args else {
                    return Err(FailureReason::BadArgumentCount);
                };
                let (Some(a), Some(b)) = (a.as_i32(), b.as_i32()) else {
                    return Err(FailureReason::InvalidArgument);
                };
                Ok(Value::I32(a.wrapping_add(b)))
            }
            "get_message" => {
                if !args.is_empty() {
                    return Err(FailureReason::BadArgumentCount);
                }
                Ok(Value::Str("Hello from the info service!".into()))
            }
            "get_student_info" => {
                let [age, student] = args else {
                    return Err(FailureReason::BadArgumentCount);
                };
                let Some(age) = age.as_i32() else {
                    return Err(FailureReason::InvalidArgument);
                };
                let mut student =
                    Student::from_value(student).map_err(|_| FailureReason::InvalidArgument)?;
                student.age = age;
                student.grade = grade_for(age);
                Ok(student.to_value())
            }
            _ => Err(FailureReason::MethodNotFound),
        }
    }
}

/// Typed client-side proxy for [`InfoService`].
///
/// The interface is described once (the method set below); this proxy
/// forwards each call through the RPC channel, and the service's dispatcher
/// is the other half of the same contract.
pub struct InfoClient<'a> {
    conn: &'a Connection,
}

impl<'a> InfoClient<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, a: i32, b: i32) -> Result<i32> {
        let value = self
            .conn
            .call("add", &[Value::I32(a), Value::I32(b)])
            .await?;
        expect_i32(value)
    }

    pub async fn get_message(&self) -> Result<String> {
        let value = self.conn.call("get_message", &[]).await?;
        match value {
            Value::Str(s) => Ok(s),
            other => Err(type_mismatch("string", &other)),
        }
    }

    pub async fn get_student_info(&self, age: i32, student: &Student) -> Result<Student> {
        let value = self
            .conn
            .call("get_student_info", &[Value::I32(age), student.to_value()])
            .await?;
        Student::from_value(&value).map_err(Error::Marshal)
    }
}

fn expect_i32(value: Value) -> Result<i32> {
    match value {
        Value::I32(v) => Ok(v),
        other => Err(type_mismatch("i32", &other)),
    }
}

fn type_mismatch(expected: &str, found: &Value) -> Error {
    Error::Marshal(tetherrpc::Error::TypeMismatch {
        expected: expected.into(),
        found: found.kind().into(),
    })
}

/// Messenger demo service: a tiny student roster.
///
/// Envelopes with an `id` field get one reply envelope with the matching
/// student's `name` and `age`. Envelopes with a `watch` field register the
/// sender's mailbox for [`announce`](RosterService::announce) pushes — the
/// callback-list idiom, expressed as retained peer handles.
#[derive(Clone)]
pub struct RosterService {
    roster: Arc<StdMutex<HashMap<i64, (String, i64)>>>,
    watchers: Arc<StdMutex<Vec<Peer>>>,
}

impl RosterService {
    /// Creates the roster with its one famous entry: `1000 → zhangsan, 18`.
    pub fn new() -> Self {
        let mut roster = HashMap::new();
        roster.insert(1000, ("zhangsan".to_string(), 18));
        Self {
            roster: Arc::new(StdMutex::new(roster)),
            watchers: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Adds or replaces a roster entry.
    pub fn insert(&self, id: i64, name: impl Into<String>, age: i64) {
        self.roster
            .lock()
            .expect("roster lock poisoned")
            .insert(id, (name.into(), age));
    }

    /// Pushes an announcement envelope to every watcher, best effort.
    pub fn announce(&self, name: &str, age: i64) {
        let watchers = self.watchers.lock().expect("watcher list lock poisoned");
        for peer in watchers.iter() {
            peer.post(Message::new().with_str("name", name).with_int("age", age));
        }
    }
}

#[async_trait::async_trait]
impl Service for RosterService {
    fn deliver(&self, message: Message, reply: Option<ReplyAddress>) {
        if message.int("watch").is_some() {
            if let Some(reply) = reply {
                self.watchers
                    .lock()
                    .expect("watcher list lock poisoned")
                    .push(reply.peer());
            }
            return;
        }

        let Some(id) = message.int("id") else { return };
        let Some(reply) = reply else { return };
        let entry = self
            .roster
            .lock()
            .expect("roster lock poisoned")
            .get(&id)
            .cloned();
        if let Some((name, age)) = entry {
            reply.send(Message::new().with_str("name", name).with_int("age", age));
        }
    }
}

impl Default for RosterService {
    fn default() -> Self {
        Self::new()
    }
}
