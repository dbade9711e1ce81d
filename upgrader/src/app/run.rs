//! Upgrade run driver

use chrono::Utc;
use tracing::warn;

use crate::app::options::UpgradeRequest;
use crate::device::session::DeviceSession;
use crate::device::transport::{InstallRequest, Transport};
use crate::errors::UpgradeError;
use crate::logs::RunLogger;
use crate::package::{self, Package};
use crate::upgrade::fsm::{UpgradeEvent, UpgradeFsm};
use crate::upgrade::install::{self, InstallOutcome};
use crate::upgrade::progress::ProgressEvent;
use crate::upgrade::reboot::{self, RebootResult};
use crate::upgrade::report::{self, UpgradeSummary};

/// Run one upgrade against `request.device`
///
/// Returns `Err` only for pre-flight and connection failures. Once the
/// session is open every outcome, including install and reboot failures, is
/// reported through the summary and the session is closed before returning.
pub async fn run(
    request: &UpgradeRequest,
    transport: Box<dyn Transport>,
    logger: &mut RunLogger,
) -> Result<UpgradeSummary, UpgradeError> {
    let started_at = Utc::now();
    let mut fsm = UpgradeFsm::new();
    advance(&mut fsm, UpgradeEvent::Start);

    let package = match package::locate(&request.package).await {
        Ok(package) => {
            advance(&mut fsm, UpgradeEvent::PackageLocated);
            package
        }
        Err(e) => {
            advance(&mut fsm, UpgradeEvent::PackageMissing(e.to_string()));
            logger.error(format!("{}. Exiting program", e));
            return Err(e);
        }
    };

    let mut session = DeviceSession::new(&request.device, transport);
    if let Err(e) = session.open().await {
        advance(&mut fsm, UpgradeEvent::ConnectFailed(e.to_string()));
        logger.error(e.to_string());
        session.close().await;
        return Err(e);
    }
    advance(&mut fsm, UpgradeEvent::Connected);

    // Installs routinely outlast interactive timeouts
    session.set_timeout(request.timeout);

    let (outcome, reboot, progress) =
        upgrade_open_session(&mut session, &package, request, &mut fsm, logger).await;

    session.close().await;
    advance(&mut fsm, UpgradeEvent::Close);

    let summary = report::report(outcome, reboot);
    logger.lifecycle(format!("Upgrade finished: {}", summary));

    Ok(UpgradeSummary {
        run_id: logger.run_id().to_string(),
        device: request.device.clone(),
        package: request.package.clone(),
        started_at,
        finished_at: Utc::now(),
        summary,
        progress,
        final_state: fsm.state(),
    })
}

/// Install and, when confirmed, reboot. Never fails; the caller closes the session.
async fn upgrade_open_session(
    session: &mut DeviceSession,
    package: &Package,
    request: &UpgradeRequest,
    fsm: &mut UpgradeFsm,
    logger: &mut RunLogger,
) -> (InstallOutcome, Option<RebootResult>, Vec<ProgressEvent>) {
    let install_request = InstallRequest {
        package: package.clone(),
        remote_dir: request.remote_dir.clone(),
        validate: request.validate,
    };

    logger.lifecycle(format!(
        "Starting the software upgrade process: {}",
        package.path().display()
    ));
    advance(fsm, UpgradeEvent::Install);

    let mut progress = Vec::new();
    let outcome = install::install(session, &install_request, |event| {
        logger.progress(event.message.as_str());
        progress.push(event);
    })
    .await;

    let confirmation = match outcome.confirmation() {
        Some(confirmation) => {
            advance(fsm, UpgradeEvent::InstallSucceeded);
            confirmation
        }
        None => {
            let reason = outcome.reason().unwrap_or_default().to_string();
            logger.error(format!("Unable to install software, {}", reason));
            advance(fsm, UpgradeEvent::InstallFailed(reason));
            return (outcome, None, progress);
        }
    };

    if !request.reboot {
        logger.lifecycle("Software installation complete. Reboot skipped");
        return (outcome, None, progress);
    }

    logger.lifecycle("Software installation complete. Rebooting");
    advance(fsm, UpgradeEvent::Reboot);

    let result = reboot::reboot(session, confirmation).await;
    match &result {
        RebootResult::Rebooted { acknowledgement } => {
            advance(fsm, UpgradeEvent::RebootAcknowledged);
            logger.lifecycle("Upgrade pending reboot cycle, please be patient.");
            if !acknowledgement.is_empty() {
                logger.lifecycle(acknowledgement.as_str());
            }
        }
        RebootResult::Error { cause } => {
            advance(fsm, UpgradeEvent::RebootFailed(cause.clone()));
            logger.error(format!("Unable to reboot device, {}", cause));
        }
    }

    (outcome, Some(result), progress)
}

fn advance(fsm: &mut UpgradeFsm, event: UpgradeEvent) {
    if let Err(e) = fsm.process(event) {
        warn!("{}", e);
    }
}
