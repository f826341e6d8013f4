use std::io::Write;

use branch::BranchConfig;
use branch_cli::cli::OpenVia;
use branch_cli::commands::{load_config, open};

const CONFIG: &str = r#"{
	"useModernSessionManager": true,
	"simulator": {
		"enabled": true,
		"links": {
			"https://example.app.link/summer": { "campaign": "summer_sale", "params": { "product_id": "12345" } }
		}
	}
}"#;

fn config_file() -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(CONFIG.as_bytes()).unwrap();
	file
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_simulated_link_via_activity() {
	let file = config_file();
	let config = load_config(Some(file.path())).unwrap();

	let report = open::execute(config, "https://example.app.link/summer", OpenVia::Activity, false, true).await.unwrap();

	assert!(report.simulated);
	assert!(report.session_id.unwrap().starts_with("simulated-"));
	assert_eq!(report.params["~campaign"], "summer_sale");
	assert_eq!(report.params["product_id"], "12345");
	assert_eq!(report.network.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_unregistered_link_uses_offline_resolver() {
	let config = BranchConfig::from_json(CONFIG).unwrap();

	let report = open::execute(config, "https://example.app.link/other?~channel=sms", OpenVia::Push, false, false).await.unwrap();

	assert!(!report.simulated);
	assert_eq!(report.params["~channel"], "sms");
	assert_eq!(report.params["+is_first_session"], true);
	assert!(report.network.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn legacy_open_honours_feature_flag() {
	let enabled = BranchConfig::from_json(CONFIG).unwrap();
	let report = open::execute(enabled, "https://example.app.link/summer", OpenVia::Launch, true, false).await.unwrap();
	assert!(report.simulated);

	let disabled = BranchConfig::from_json(r#"{"useModernSessionManager": false}"#).unwrap();
	let err = open::execute(disabled, "https://example.app.link/summer", OpenVia::Launch, true, false).await.unwrap_err();
	assert!(err.to_string().contains("modern session manager is disabled"));
}

#[test]
fn missing_config_file_is_reported() {
	let err = load_config(Some(std::path::Path::new("/nonexistent/branch.json"))).unwrap_err();
	assert!(format!("{err:#}").contains("failed to load config"));
}
