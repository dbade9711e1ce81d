//! Device session unit tests

use std::time::Duration;

use swupgrade::device::session::{DeviceSession, SessionState, DEFAULT_TIMEOUT};
use swupgrade::device::transport::InstallRequest;
use swupgrade::errors::{TransportFault, UpgradeError};
use swupgrade::package;
use swupgrade::upgrade::progress;
use tokio_test::{assert_err, assert_ok};

use crate::support::{package_file, Call, InstallScript, RebootScript, ScriptedTransport};

#[tokio::test]
async fn test_session_open_and_close() {
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    assert_eq!(session.state(), SessionState::Unopened);
    assert_eq!(session.timeout(), DEFAULT_TIMEOUT);

    assert_ok!(session.open().await);
    assert!(session.is_open());

    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(log.calls(), vec![Call::Open("edge-1".to_string()), Call::Close]);
}

#[tokio::test]
async fn test_close_is_safe_on_unopened_session() {
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(log.closes(), 1);
}

#[tokio::test]
async fn test_open_failure_is_connection_error() {
    let (transport, _log) = ScriptedTransport::new();
    let transport = transport.fail_open(TransportFault::Connect("No route to host".to_string()));
    let mut session = DeviceSession::new("edge-1", transport.boxed());

    let err = assert_err!(session.open().await);
    assert!(matches!(
        err,
        UpgradeError::ConnectionError { ref cause } if cause == "No route to host"
    ));
    assert_eq!(session.state(), SessionState::Unopened);
}

#[tokio::test]
async fn test_closed_session_cannot_reopen() {
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    session.close().await;

    assert_err!(session.open().await);
    assert_eq!(log.count(|c| matches!(c, Call::Open(_))), 0);
}

#[tokio::test]
async fn test_remote_calls_require_open_session() {
    let (_dir, path) = package_file("image.tgz");
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());

    let request = InstallRequest {
        package: package::locate(&path).await.unwrap(),
        remote_dir: "/var/tmp".to_string(),
        validate: true,
    };
    let (sink, _stream) = progress::channel(4);

    assert_eq!(
        session.install(&request, sink).await,
        Err(TransportFault::NotOpen)
    );
    assert_eq!(session.reboot().await, Err(TransportFault::NotOpen));
    assert_eq!(log.installs(), 0);
    assert_eq!(log.reboots(), 0);
}

#[tokio::test]
async fn test_set_timeout_reaches_transport() {
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    assert_ok!(session.open().await);

    session.set_timeout(Duration::from_secs(900));
    assert_eq!(session.timeout(), Duration::from_secs(900));
    assert!(log
        .calls()
        .contains(&Call::SetTimeout(Duration::from_secs(900))));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_install_bounded_by_session_timeout() {
    let (_dir, path) = package_file("image.tgz");
    let (transport, _log) = ScriptedTransport::new();
    let transport = transport.install(InstallScript::Hang);
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    assert_ok!(session.open().await);
    session.set_timeout(Duration::from_secs(5));

    let request = InstallRequest {
        package: package::locate(&path).await.unwrap(),
        remote_dir: "/var/tmp".to_string(),
        validate: false,
    };
    let (sink, _stream) = progress::channel(4);

    assert_eq!(
        session.install(&request, sink).await,
        Err(TransportFault::Timeout)
    );
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_reboot_bounded_by_session_timeout() {
    let (transport, _log) = ScriptedTransport::new();
    let transport = transport.reboot(RebootScript::Hang);
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    assert_ok!(session.open().await);
    session.set_timeout(Duration::from_secs(5));

    assert_eq!(session.reboot().await, Err(TransportFault::Timeout));
    session.close().await;
}

#[tokio::test]
async fn test_dropping_open_session_does_not_release_transport() {
    let (transport, log) = ScriptedTransport::new();
    let mut session = DeviceSession::new("edge-1", transport.boxed());
    assert_ok!(session.open().await);

    drop(session);
    assert_eq!(log.closes(), 0);
}
