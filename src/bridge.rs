use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

use crate::{config_store, logging::append_runtime_log, startup};

const RISK_DISCLOSURE_DETAIL: &str = "Trading CFDs and Forex involves significant risk of loss.\n\n\
• Up to 80% of retail investor accounts lose money when trading CFDs\n\
• You should consider whether you understand how CFDs work\n\
• You should consider whether you can afford to take the high risk of losing your money\n\
• Past performance is not indicative of future results\n\
• This software is for educational purposes and comes with no guarantees\n\n\
By continuing, you acknowledge that you understand these risks and accept full \
responsibility for your trading decisions.";

#[derive(Debug, serde::Serialize)]
pub struct BridgeResult {
    pub ok: bool,
    pub reason: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRecheckResult {
    pub platform_present: bool,
    pub backend_starting: bool,
}

#[tauri::command]
pub(crate) fn bridge_recheck_platforms(app_handle: AppHandle) -> PlatformRecheckResult {
    let backend_starting = startup::run_platform_recheck(&app_handle);
    PlatformRecheckResult {
        platform_present: backend_starting,
        backend_starting,
    }
}

#[tauri::command]
pub(crate) async fn bridge_select_install_directory(app_handle: AppHandle) -> Option<String> {
    let picked = tauri::async_runtime::spawn_blocking(move || {
        app_handle.dialog().file().blocking_pick_folder()
    })
    .await;

    match picked {
        Ok(folder) => folder.map(|path| path.to_string()),
        Err(error) => {
            append_runtime_log(&format!("directory picker task failed: {error}"));
            None
        }
    }
}

#[tauri::command]
pub(crate) async fn bridge_show_risk_warning(app_handle: AppHandle) -> bool {
    let accepted = tauri::async_runtime::spawn_blocking(move || {
        app_handle
            .dialog()
            .message(RISK_DISCLOSURE_DETAIL)
            .title("Risk Warning")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::OkCancelCustom(
                "I Accept the Risks".to_string(),
                "Cancel".to_string(),
            ))
            .blocking_show()
    })
    .await;

    match accepted {
        Ok(accepted) => accepted,
        Err(error) => {
            append_runtime_log(&format!("risk warning dialog task failed: {error}"));
            false
        }
    }
}

#[tauri::command]
pub(crate) fn bridge_save_user_config(config: serde_json::Value) -> BridgeResult {
    let Some(path) = config_store::config_file_path() else {
        append_runtime_log("config save rejected: cannot resolve config directory");
        return BridgeResult {
            ok: false,
            reason: Some("Cannot resolve the configuration directory.".to_string()),
        };
    };

    match config_store::save_config_record(&path, &config) {
        Ok(()) => {
            append_runtime_log(&format!("config record saved to {}", path.display()));
            BridgeResult {
                ok: true,
                reason: None,
            }
        }
        Err(error) => {
            append_runtime_log(&format!("config save failed: {error}"));
            BridgeResult {
                ok: false,
                reason: Some(error),
            }
        }
    }
}
