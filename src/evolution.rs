//! Daily feature proposals, requested as structured JSON.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::gemini::{self, GenerateContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProposal {
    pub feature_name: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_effort_days: f64,
}

impl fmt::Display for FeatureProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {} (優先度: {}, 予測工数: {}日)",
            self.feature_name, self.priority, self.estimated_effort_days
        )
    }
}

pub const PROMPT: &str = r#"あなたはユグドラシルの進化を促進するAIです。
現在のユグドラシルの状況は以下の通りです。
- ユーザーからのフィードバック: 「もっとゲームの種類を増やしてほしい」「UIがもっと直感的だと良い」
- 開発状況: 現在、基本的なチャット機能とシンプルなツール連携が実装されています。
- 目標: ユーザーエンゲージメントの向上と、より複雑なタスクへの対応。

上記の状況に基づき、ユグドラシルに実装すべき新しい機能アイデアを3つ提案してください。
各機能について、以下の情報をJSON形式の配列で提供してください。
- featureName (文字列): 機能の簡潔な名前
- description (文字列): 機能の詳細な説明
- priority (文字列): 優先度 ("Low", "Medium", "High" のいずれか)
- estimatedEffortDays (数値): 実装にかかる推定日数（整数）
"#;

pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "featureName": {"type": "STRING"},
                "description": {"type": "STRING"},
                "priority": {"type": "STRING", "enum": ["Low", "Medium", "High"]},
                "estimatedEffortDays": {"type": "NUMBER"}
            },
            "required": ["featureName", "description", "priority", "estimatedEffortDays"]
        }
    })
}

pub fn parse_proposals(reply: &str) -> anyhow::Result<Vec<FeatureProposal>> {
    serde_json::from_str(reply.trim()).context("parse feature proposals")
}

pub fn save(proposals: &[FeatureProposal], path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(proposals)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

/// Asks for new feature ideas and stores them at `output`.
pub fn propose(
    config: &Config,
    client: &gemini::Client,
    output: &Path,
) -> anyhow::Result<Vec<FeatureProposal>> {
    let request = GenerateContentRequest::from_prompt(PROMPT).with_json_schema(response_schema());
    tracing::info!(model = %config.gemini.proposer_model, "requesting feature proposals");
    let reply = client
        .generate_text(&config.gemini.proposer_model, &request)
        .context("request feature proposals")?;

    let proposals = parse_proposals(&reply)?;
    if proposals.is_empty() {
        bail!("model proposed no features");
    }
    save(&proposals, output)?;
    Ok(proposals)
}
