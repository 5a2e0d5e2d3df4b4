//! Durable calibration writes.

use std::fs;
use std::io::Write;
use std::path::Path;

use eyre::WrapErr;
use nutriscale_config::PersistedCalibration;
use nutriscale_core::CalibrationState;

/// Write `bytes` to a sibling temp file, sync it, then rename over `path`.
/// Readers see either the old file or the new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> eyre::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("not a file path: {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut f = fs::File::create(&tmp)
        .wrap_err_with(|| format!("create {}", tmp.display()))?;
    f.write_all(bytes)
        .wrap_err_with(|| format!("write {}", tmp.display()))?;
    f.sync_all()
        .wrap_err_with(|| format!("sync {}", tmp.display()))?;
    drop(f);
    fs::rename(&tmp, path).wrap_err_with(|| format!("rename into {}", path.display()))?;
    Ok(())
}

pub fn save_calibration(path: &Path, state: &CalibrationState) -> eyre::Result<()> {
    let persisted = PersistedCalibration::from(state);
    write_atomic(path, persisted.to_toml_string()?.as_bytes())?;
    tracing::info!(
        file = %path.display(),
        offset = persisted.offset,
        gain = persisted.gain,
        "calibration saved"
    );
    Ok(())
}
