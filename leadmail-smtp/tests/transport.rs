//! Delivery through the SMTP transport against a scripted relay.

mod support;

use leadmail_common::Security;
use leadmail_smtp::{
    DeliveryError, OutboundMessage, PermanentError, RelayConfig, SmtpTransport, TemporaryError,
    Transport,
};
use support::mock_server::{MockRelay, RelayCommand};

fn relay_config(relay: &MockRelay) -> RelayConfig {
    let mut config = RelayConfig::new("127.0.0.1");
    config.port = relay.addr().port();
    config.security = Security::None;
    config.username = "me@example.com".to_string();
    config.from_name = "Jane Doe".to_string();
    config
}

fn transport(relay: &MockRelay) -> SmtpTransport {
    SmtpTransport::with_password(relay_config(relay), "app-password").unwrap()
}

fn message() -> OutboundMessage {
    OutboundMessage {
        to: "lead@acme.test".to_string(),
        subject: "Quick question, Ada".to_string(),
        body_text: "Hi Ada,\n\nHello.".to_string(),
        body_html: Some("<p>Hi Ada,</p>".to_string()),
        from_display_name: None,
    }
}

#[tokio::test]
async fn test_successful_delivery() {
    let relay = MockRelay::builder().build().await.unwrap();

    transport(&relay).send(&message()).await.unwrap();

    let commands = relay.commands().await;
    assert!(matches!(&commands[0], RelayCommand::Ehlo(domain) if domain == "localhost"));
    assert!(matches!(&commands[1], RelayCommand::Auth(m) if m.starts_with("PLAIN ")));
    assert_eq!(commands[2], RelayCommand::MailFrom("FROM:<me@example.com>".to_string()));
    assert_eq!(commands[3], RelayCommand::RcptTo("TO:<lead@acme.test>".to_string()));
    assert_eq!(commands[4], RelayCommand::Data);
    assert_eq!(*commands.last().unwrap(), RelayCommand::Quit);

    let messages = relay.messages().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("From: \"Jane Doe\" <me@example.com>\r\n"));
    assert!(messages[0].contains("To: lead@acme.test\r\n"));
    assert!(messages[0].contains("Subject: Quick question, Ada\r\n"));
    assert!(messages[0].contains("multipart/alternative"));

    relay.shutdown();
}

#[tokio::test]
async fn test_auth_login_fallback() {
    let relay = MockRelay::builder()
        .with_capabilities(&["mock.relay", "AUTH LOGIN"])
        .build()
        .await
        .unwrap();

    transport(&relay).send(&message()).await.unwrap();

    let commands = relay.commands().await;
    assert_eq!(commands[1], RelayCommand::Auth("LOGIN".to_string()));
    assert_eq!(commands[2], RelayCommand::AuthLine);
    assert_eq!(commands[3], RelayCommand::AuthLine);

    relay.shutdown();
}

#[tokio::test]
async fn test_rejected_recipient_is_permanent() {
    let relay = MockRelay::builder()
        .with_rcpt_to_response(550, "No such user")
        .build()
        .await
        .unwrap();

    let err = transport(&relay).send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Permanent(PermanentError::MessageRejected(ref m)) if m.contains("550")
    ));
    assert!(relay.messages().await.is_empty());

    relay.shutdown();
}

#[tokio::test]
async fn test_bad_credentials() {
    let relay = MockRelay::builder()
        .with_auth_response(535, "5.7.8 Username and Password not accepted")
        .build()
        .await
        .unwrap();

    let err = transport(&relay).send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Permanent(PermanentError::AuthenticationFailed(_))
    ));

    relay.shutdown();
}

#[tokio::test]
async fn test_busy_relay_is_temporary() {
    let relay = MockRelay::builder()
        .with_mail_from_response(421, "Too many connections")
        .build()
        .await
        .unwrap();

    let err = transport(&relay).send(&message()).await.unwrap_err();
    assert!(err.is_temporary());

    relay.shutdown();
}

#[tokio::test]
async fn test_rejected_greeting() {
    let relay = MockRelay::builder()
        .with_greeting(554, "No SMTP service here")
        .build()
        .await
        .unwrap();

    let err = transport(&relay).send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Temporary(TemporaryError::ServerBusy(_))
    ));

    relay.shutdown();
}

#[tokio::test]
async fn test_no_auth_mechanism() {
    let relay = MockRelay::builder()
        .with_capabilities(&["mock.relay", "SIZE 1000000"])
        .build()
        .await
        .unwrap();

    let err = transport(&relay).send(&message()).await.unwrap_err();
    assert!(err.is_permanent());

    relay.shutdown();
}

#[tokio::test]
async fn test_starttls_required_but_not_offered() {
    let relay = MockRelay::builder().build().await.unwrap();
    let mut config = relay_config(&relay);
    config.security = Security::StartTls;
    let transport = SmtpTransport::with_password(config, "app-password").unwrap();

    let err = transport.send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Permanent(PermanentError::TlsRequired(_))
    ));
    assert!(
        !relay
            .commands()
            .await
            .iter()
            .any(|c| matches!(c, RelayCommand::Auth(_)))
    );

    relay.shutdown();
}

#[tokio::test]
async fn test_unresponsive_relay_times_out() {
    let relay = MockRelay::builder()
        .with_hang_on_command(2)
        .build()
        .await
        .unwrap();
    let mut config = relay_config(&relay);
    config.timeouts.mail_from_secs = 1;
    let transport = SmtpTransport::with_password(config, "app-password").unwrap();

    let err = transport.send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Temporary(TemporaryError::Timeout(ref m)) if m.contains("MAIL FROM")
    ));

    relay.shutdown();
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = RelayConfig::new("127.0.0.1");
    config.port = port;
    config.security = Security::None;
    config.from_address = Some("me@example.com".to_string());
    let transport = SmtpTransport::with_password(config, "").unwrap();

    let err = transport.send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Temporary(TemporaryError::ConnectionFailed(_))
    ));
}

#[tokio::test]
async fn test_verify_does_not_send() {
    let relay = MockRelay::builder().build().await.unwrap();

    transport(&relay).verify().await.unwrap();

    let commands = relay.commands().await;
    assert!(matches!(commands[0], RelayCommand::Ehlo(_)));
    assert!(matches!(commands[1], RelayCommand::Auth(_)));
    assert_eq!(commands[2], RelayCommand::Quit);
    assert_eq!(commands.len(), 3);

    relay.shutdown();
}
