use super::{exit_codes, open_store};
use crate::cli::args::ImportArgs;
use anyhow::Context;
use skillboard_core::config::SkillboardConfig;
use skillboard_core::model::ProfileUpsert;
use tokio::io::AsyncBufReadExt;

pub async fn cmd_import(args: ImportArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let profiles = read_profiles(&args.file).await?;
    let store = open_store(cfg)?;

    let count = profiles.len();
    let summary = tokio::task::spawn_blocking(move || store.upsert_batch(&profiles))
        .await
        .context("import task panicked")??;

    tracing::info!(
        event = "import_done",
        file = %args.file.display(),
        lines = count,
        inserted = summary.inserted,
        updated = summary.updated
    );
    println!("{}", serde_json::to_string(&summary)?);
    Ok(exit_codes::OK)
}

/// One `ProfileUpsert` per non-blank line. The first bad line aborts the import.
async fn read_profiles(path: &std::path::Path) -> anyhow::Result<Vec<ProfileUpsert>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut lines = tokio::io::BufReader::new(file).lines();

    let mut out = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let profile: ProfileUpsert = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid profile line", path.display(), line_no))?;
        out.push(profile);
    }
    Ok(out)
}
