use anyhow::{Context, Result, bail};
use branch::integration::params_from_session;
use branch::simulator::NetworkLogEntry;
use branch::{Branch, BranchConfig, BranchError, SIMULATED_ID_PREFIX, Session, UserActivity};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::info;

use crate::cli::OpenVia;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	pub simulated: bool,
	pub params: Map<String, Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub network: Option<Vec<NetworkLogEntry>>,
}

pub async fn execute(config: BranchConfig, url: &str, via: OpenVia, legacy: bool, show_network: bool) -> Result<OpenReport> {
	let engine = Branch::builder().config(config).build().context("failed to start session engine")?;
	if show_network {
		engine.simulator().enable_network_logging();
	}

	let mut report = if legacy {
		let params = open_legacy(&engine, url).await?;
		let session_id = params.get(branch::keys::SESSION_ID).and_then(Value::as_str).map(String::from);
		OpenReport {
			simulated: session_id.as_deref().is_some_and(|id| id.starts_with(SIMULATED_ID_PREFIX)),
			session_id,
			params,
			network: None,
		}
	} else {
		let session = open(&engine, url, via).await?;
		info!(target = "branch.cli", session_id = %session.id, simulated = session.link_is_simulated(), "session opened");
		OpenReport {
			session_id: Some(session.id.clone()),
			simulated: session.link_is_simulated(),
			params: params_from_session(&session),
			network: None,
		}
	};

	if show_network {
		report.network = Some(engine.simulator().network_logs());
	}
	Ok(report)
}

async fn open(engine: &Branch, url: &str, via: OpenVia) -> Result<Session> {
	let (tx, rx) = oneshot::channel();
	let done = move |result: Result<Session, BranchError>| {
		let _ = tx.send(result);
	};

	let coordinator = engine.coordinator();
	match via {
		OpenVia::Launch => coordinator.initialize_with_url(Some(url), done),
		OpenVia::Activity => {
			coordinator.continue_user_activity(&UserActivity::browsing_web(url), done);
		}
		OpenVia::Push => {
			let mut payload = Map::new();
			payload.insert(branch::coordinator::PUSH_LINK_KEY.to_string(), Value::from(url));
			coordinator.handle_push_notification(&payload, done);
		}
	}

	let result = rx.await.context("session completion was dropped")?;
	result.with_context(|| format!("failed to open {url}"))
}

async fn open_legacy(engine: &Branch, url: &str) -> Result<Map<String, Value>> {
	let (tx, rx) = oneshot::channel();
	let routed = engine.initialize_legacy(Some(url), move |result| {
		let _ = tx.send(result);
	});
	if !routed {
		bail!("modern session manager is disabled; set useModernSessionManager or BRANCH_USE_MODERN_SESSION_MANAGER=1");
	}
	let result = rx.await.context("session completion was dropped")?;
	result.with_context(|| format!("failed to open {url}"))
}
