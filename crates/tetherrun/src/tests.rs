//! Unit tests for the runtime building blocks.

use crate::channel::ChannelTransport;
use crate::demo::InfoService;
use crate::demo::Student;
use crate::error::Error;
use crate::message::Message;
use crate::registry::Registry;
use crate::service::Service;
use crate::transport::Transport;

use tetherrpc::FailureReason;
use tetherrpc::Value;

// --- Channel transport ---

#[tokio::test]
async fn test_channel_pair_duplex() {
    let (a, b) = ChannelTransport::pair();

    a.send(b"ping").await.unwrap();
    assert_eq!(b.recv().await.unwrap(), Some(b"ping".to_vec()));

    b.send(b"pong").await.unwrap();
    assert_eq!(a.recv().await.unwrap(), Some(b"pong".to_vec()));
}

#[tokio::test]
async fn test_channel_close_ends_peer_stream() {
    let (a, b) = ChannelTransport::pair();
    a.close();
    assert_eq!(b.recv().await.unwrap(), None);
    assert!(a.send(b"late").await.is_err());
}

#[tokio::test]
async fn test_channel_close_is_idempotent() {
    let (a, _b) = ChannelTransport::pair();
    a.close();
    a.close();
}

// --- Registry ---

#[test]
fn test_register_and_resolve() {
    let registry = Registry::new();
    registry.register("tether.test.Svc", InfoService).unwrap();

    let endpoint = registry.resolve("tether.test.Svc").unwrap();
    assert_eq!(endpoint.name().as_str(), "tether.test.Svc");
}

#[test]
fn test_duplicate_registration_rejected() {
    let registry = Registry::new();
    registry.register("tether.test.Svc", InfoService).unwrap();

    let err = registry.register("tether.test.Svc", InfoService).unwrap_err();
    assert!(matches!(err, Error::AlreadyRegistered(name) if name.as_str() == "tether.test.Svc"));
}

#[test]
fn test_resolve_unknown_is_not_found() {
    let registry = Registry::new();
    let err = registry.resolve("tether.test.Ghost").unwrap_err();
    assert!(matches!(err, Error::NotFound(name) if name.as_str() == "tether.test.Ghost"));
}

#[test]
fn test_shutdown_unknown_returns_false() {
    let registry = Registry::new();
    assert!(!registry.shutdown("tether.test.Ghost"));
}

#[test]
fn test_shutdown_unregisters() {
    let registry = Registry::new();
    registry.register("tether.test.Svc", InfoService).unwrap();
    assert!(registry.shutdown("tether.test.Svc"));
    assert!(registry.resolve("tether.test.Svc").is_err());
    // A second shutdown is a no-op.
    assert!(!registry.shutdown("tether.test.Svc"));
}

// --- Message field bag ---

#[test]
fn test_message_fields() {
    let msg = Message::new()
        .with_int("id", 1000)
        .with_str("name", "zhangsan");

    assert_eq!(msg.int("id"), Some(1000));
    assert_eq!(msg.str("name"), Some("zhangsan"));
    assert_eq!(msg.int("name"), None);
    assert_eq!(msg.str("missing"), None);
    assert_eq!(msg.fields().len(), 2);
}

// --- Student marshalling ---

#[test]
fn test_student_roundtrip() {
    let cases = [
        Student { name: "张三".into(), age: 10, grade: "Grade 5".into() },
        Student { name: String::new(), age: 0, grade: String::new() },
        Student { name: "negative".into(), age: -7, grade: "Grade 0".into() },
    ];

    for student in cases {
        let value = student.to_value();
        assert_eq!(Student::from_value(&value).unwrap(), student);
    }
}

#[test]
fn test_student_ignores_unknown_fields() {
    let value = Value::Record(vec![
        ("name".into(), Value::Str("zhangsan".into())),
        ("age".into(), Value::I32(18)),
        ("homeroom".into(), Value::Str("B2".into())),
        ("grade".into(), Value::Str("Grade 4".into())),
    ]);

    let student = Student::from_value(&value).unwrap();
    assert_eq!(student.name, "zhangsan");
    assert_eq!(student.age, 18);
    assert_eq!(student.grade, "Grade 4");
}

#[test]
fn test_student_missing_field_rejected() {
    let value = Value::Record(vec![("name".into(), Value::Str("x".into()))]);
    assert!(matches!(
        Student::from_value(&value),
        Err(tetherrpc::Error::MissingField(_))
    ));
}

#[test]
fn test_student_from_non_record_rejected() {
    assert!(matches!(
        Student::from_value(&Value::I32(5)),
        Err(tetherrpc::Error::TypeMismatch { .. })
    ));
}

// --- InfoService dispatch ---

#[tokio::test]
async fn test_info_service_add() {
    let result = InfoService
        .call("add", &[Value::I32(10), Value::I32(20)])
        .await;
    assert_eq!(result, Ok(Value::I32(30)));
}

#[tokio::test]
async fn test_info_service_bad_argument_count() {
    let result = InfoService.call("add", &[Value::I32(10)]).await;
    assert_eq!(result, Err(FailureReason::BadArgumentCount));
}

#[tokio::test]
async fn test_info_service_bad_argument_shape() {
    let result = InfoService
        .call("add", &[Value::Str("ten".into()), Value::I32(20)])
        .await;
    assert_eq!(result, Err(FailureReason::InvalidArgument));
}

#[tokio::test]
async fn test_info_service_unknown_method() {
    let result = InfoService.call("subtract", &[]).await;
    assert_eq!(result, Err(FailureReason::MethodNotFound));
}

#[tokio::test]
async fn test_info_service_student_grades() {
    for (age, grade) in [(12, "Grade 3"), (0, "Grade 1"), (35, "Grade 6")] {
        let student = Student { name: "s".into(), age: 1, grade: "?".into() };
        let result = InfoService
            .call("get_student_info", &[Value::I32(age), student.to_value()])
            .await
            .unwrap();
        let updated = Student::from_value(&result).unwrap();
        assert_eq!(updated.age, age);
        assert_eq!(updated.grade, grade);
        assert_eq!(updated.name, "s");
    }
}
