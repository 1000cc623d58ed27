//! The generated business homepage: first draft, daily refresh, and the news hook.

use anyhow::{bail, Context};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::Config;
use crate::gemini::{self, GenerateContentRequest};
use crate::prompt;
use crate::text;

pub const NO_NEWS: &str = "最新ニュースはありません。";
pub const NEWS_FAILED: &str = "最新ニュースの取得に失敗しました。";
const STORY_EXCERPT_CHARS: usize = 600;
const RSS_TIMEOUT: Duration = Duration::from_secs(20);

static RSS_ITEM_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<item\b.*?<title>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</title>")
        .expect("rss title regex")
});

/// What the homepage is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brief {
    pub purpose: String,
    pub customers: String,
    pub services: String,
    pub contact: String,
    pub site_title: String,
}

impl Default for Brief {
    fn default() -> Self {
        Self {
            purpose: "革新的なAIソリューションの提供".to_string(),
            customers: "中小企業、スタートアップ".to_string(),
            services: "コンテンツ自動生成、データ分析".to_string(),
            contact: "info@example.com".to_string(),
            site_title: "AI Business Solutions".to_string(),
        }
    }
}

/// Fields left unset on the command line.
#[derive(Debug, Clone, Default)]
pub struct BriefOverrides {
    pub purpose: Option<String>,
    pub customers: Option<String>,
    pub services: Option<String>,
    pub contact: Option<String>,
    pub site_title: Option<String>,
}

impl BriefOverrides {
    /// Fills gaps from the terminal when `interactive`, otherwise from defaults.
    pub fn resolve(self, interactive: bool) -> Brief {
        let defaults = Brief::default();
        let pick = |value: Option<String>, question: &str, default: String| match value {
            Some(value) => value,
            None if interactive => prompt::ask(question, &default),
            None => default,
        };
        Brief {
            purpose: pick(self.purpose, "ビジネスの目的", defaults.purpose),
            customers: pick(self.customers, "ターゲット顧客", defaults.customers),
            services: pick(self.services, "提供するサービス", defaults.services),
            contact: pick(self.contact, "連絡先情報", defaults.contact),
            site_title: pick(self.site_title, "ホームページのタイトル", defaults.site_title),
        }
    }
}

/// A story and its video to showcase on the page.
#[derive(Debug, Clone)]
pub struct Showcase<'a> {
    pub story_name: &'a str,
    pub story: &'a str,
    pub video: &'a Path,
}

pub fn generation_prompt(brief: &Brief, showcase: Option<&Showcase<'_>>) -> String {
    let mut prompt = format!(
        r#"
あなたは、AIビジネスのホームページのコンテンツとHTML構造を生成する専門家です。以下の情報に基づき、コンテンツとHTML骨子（bodyタグ内）を作成してください。

**デザイン要件:**
*   堅牢でシックな雰囲気にしてください。
*   画像は直接埋め込まず、視覚情報は動画へのリンク（埋め込みコードではない）で表現してください。
*   HTMLやスタイルで表現可能な部分は積極的に活用し、効果的に色も使用して、魅力的で分かりやすいコンテンツにしてください。

**ビジネス情報:**
*   **ビジネスの目的:** {}
*   **ターゲット顧客:** {}
*   **提供するサービス:** {}
*   **連絡先:** {}

**生成する内容:**
*   メインタイトルとサブタイトル
*   ビジネスの紹介文
*   サービス内容の詳細（各サービスの簡単な説明）
*   お客様の声（架空で可）
*   行動喚起（CTA）
*   フッター情報
"#,
        brief.purpose, brief.customers, brief.services, brief.contact
    );

    if let Some(showcase) = showcase {
        let excerpt: String = showcase.story.chars().take(STORY_EXCERPT_CHARS).collect();
        let video = showcase
            .video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        prompt.push_str(&format!(
            r#"
**本日の物語:**
*   「{}」を紹介するセクションを設け、あらすじを数行で添えてください。
*   動画へのリンクは href="{}" としてください。
*   物語の冒頭:
{}
"#,
            text::title_from_filename(showcase.story_name),
            video,
            excerpt
        ));
    }

    prompt.push_str(
        r#"
**出力形式:**
*   HTMLの`<body>`タグ内のみを生成してください。
*   CSSやJavaScriptは含めないでください。
*   HTML要素は意味論的に正しいものを使用し、フレームワークは考慮せず、プレーンなHTML構造でお願いします。
"#,
    );
    prompt
}

pub fn page_shell(site_title: &str, base_href: Option<&str>, body: &str) -> String {
    let base = base_href
        .map(|href| format!("    <base href=\"{}\">\n", text::escape_html(href)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
{base}</head>
<body>
{body}
</body>
</html>"#,
        text::escape_html(site_title)
    )
}

/// Drafts the homepage from `brief` and writes it to the public directory.
pub fn generate(
    config: &Config,
    client: &gemini::Client,
    brief: &Brief,
    showcase: Option<&Showcase<'_>>,
) -> anyhow::Result<PathBuf> {
    let request = GenerateContentRequest::from_prompt(generation_prompt(brief, showcase));
    tracing::info!(site = %brief.site_title, "requesting homepage content");
    let reply = client
        .generate_text(&config.gemini.model, &request)
        .context("generate homepage body")?;

    let body = if reply.contains("```") {
        text::strip_code_fences(&reply)
    } else {
        reply
    };
    if body.trim().is_empty() {
        bail!("model returned an empty homepage body");
    }

    let page = page_shell(&brief.site_title, config.homepage.base_href.as_deref(), &body);
    let output = config.homepage_path();
    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::write(&output, page).with_context(|| format!("write {}", output.display()))?;
    Ok(output)
}

/// Title of the first `<item>` in an RSS document.
pub fn first_item_title(xml: &str) -> Option<String> {
    let caps = RSS_ITEM_TITLE.captures(xml)?;
    let title = caps[1]
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Latest headline from `url`, or a fixed phrase when there is none.
pub fn latest_headline(url: &str) -> String {
    tracing::info!(url, "fetching rss feed");
    let fetched = reqwest::blocking::Client::builder()
        .timeout(RSS_TIMEOUT)
        .build()
        .and_then(|client| client.get(url).send())
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text());

    match fetched {
        Ok(xml) => match first_item_title(&xml) {
            Some(title) => {
                tracing::info!(headline = %title, "latest headline");
                title
            }
            None => {
                tracing::warn!("rss feed has no entries");
                NO_NEWS.to_string()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "rss fetch failed");
            NEWS_FAILED.to_string()
        }
    }
}

pub fn brush_up_instruction(headline: &str) -> String {
    format!(
        "今日のニュースのテーマ「{headline}」に合わせて、より魅力的で洗練されたデザインにブラッシュアップしてください。特に、このテーマに関連するコンテンツや表現を強化してください。"
    )
}

pub fn brush_up_prompt(original: &str, instruction: &str) -> String {
    [
        "あなたは、既存のHTMLコンテンツをユーザーの指示に基づいてブラッシュアップする専門家です。",
        "元のHTMLコンテンツの構造と内容を尊重しつつ、より魅力的で洗練されたHTMLを出力してください。",
        "**デザイン要件:**",
        "* 堅牢でシックな雰囲気を保ってください。",
        "* 画像は直接埋め込まず、視覚情報は動画へのリンク（埋め込みコードではない）で表現してください。",
        "**出力形式:**",
        "* 最終的なHTMLファイル全体（`<!DOCTYPE html>`から`</html>`まで）を生成してください。ただし、headタグ内の`<base href=...>`は現状維持してください。",
        "* CSSは`<style>`タグ内に記述するか、HTML要素にインラインスタイルで適用してください。",
        "* JavaScriptは含めないでください。",
        "",
        "--- 元のHTMLコンテンツ ---",
        original,
        "",
        "--- ユーザーからのブラッシュアップ指示 ---",
        instruction,
        "",
        "--- ブラッシュアップ後のHTML ---",
    ]
    .join("\n")
}

/// Refreshes the homepage around today's headline, keeping a timestamped backup.
pub fn brush_up(config: &Config, client: &gemini::Client) -> anyhow::Result<PathBuf> {
    let page = config.homepage_path();
    if !page.exists() {
        bail!(
            "homepage not found: {}; run `saga-press homepage` first",
            page.display()
        );
    }
    let original = fs::read_to_string(&page).with_context(|| format!("read {}", page.display()))?;

    let headline = latest_headline(&config.homepage.rss_url);
    let instruction = brush_up_instruction(&headline);
    let request = GenerateContentRequest::from_prompt(brush_up_prompt(&original, &instruction));
    let reply = client
        .generate_text(&config.gemini.model, &request)
        .context("brush up homepage")?;

    let refreshed = text::strip_code_fences(&reply);
    if refreshed.trim().is_empty() {
        bail!("model returned an empty page");
    }

    let backup = PathBuf::from(format!("{}.bak_{}", page.display(), text::timestamp()));
    fs::rename(&page, &backup)
        .with_context(|| format!("back up {} to {}", page.display(), backup.display()))?;
    tracing::info!(backup = %backup.display(), "original homepage backed up");

    fs::write(&page, refreshed).with_context(|| format!("write {}", page.display()))?;
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{point_at, reply, serve};

    #[test]
    fn first_item_title_skips_channel_title() {
        let xml = r#"<rss><channel><title>NHK</title>
            <item><title><![CDATA[台風が接近 &amp; 警戒]]></title></item>
            <item><title>second</title></item></channel></rss>"#;
        assert_eq!(first_item_title(xml).as_deref(), Some("台風が接近 & 警戒"));
    }

    #[test]
    fn feed_without_items_has_no_title() {
        assert!(first_item_title("<rss><channel><title>x</title></channel></rss>").is_none());
    }

    #[test]
    fn shell_includes_base_only_when_configured() {
        let page = page_shell("Site <1>", Some("https://example.org/"), "<h1>hi</h1>");
        assert!(page.contains("<title>Site &lt;1&gt;</title>"));
        assert!(page.contains(r#"<base href="https://example.org/">"#));
        assert!(page.contains("<body>\n<h1>hi</h1>\n</body>"));

        assert!(!page_shell("s", None, "b").contains("<base"));
    }

    #[test]
    fn showcase_prompt_links_video_by_file_name() {
        let showcase = Showcase {
            story_name: "first_light.md",
            story: "本文",
            video: Path::new("/out/videos/assembled_video_first_light.mp4"),
        };
        let prompt = generation_prompt(&Brief::default(), Some(&showcase));
        assert!(prompt.contains("「first light」"));
        assert!(prompt.contains(r#"href="assembled_video_first_light.mp4""#));
        assert!(!generation_prompt(&Brief::default(), None).contains("本日の物語"));
    }

    #[test]
    fn overrides_fill_remaining_fields_from_defaults() {
        let brief = BriefOverrides {
            site_title: Some("Saga Works".into()),
            ..BriefOverrides::default()
        }
        .resolve(false);
        assert_eq!(brief.site_title, "Saga Works");
        assert_eq!(brief.contact, Brief::default().contact);
    }

    #[test]
    fn brush_up_requires_existing_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.public_dir = dir.path().to_path_buf();
        let client = gemini::Client::new("k".into(), &config.gemini).unwrap();
        assert!(brush_up(&config, &client).is_err());
    }

    #[test]
    fn generate_strips_fences_and_wraps_reply_in_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let (base, server) = serve(vec![(
            200,
            reply("説明です。\n```html\n<h1>Saga Works</h1>\n```\n以上"),
        )]);
        let mut config = Config::default();
        config.paths.public_dir = dir.path().join("public");
        config.homepage.base_href = Some("https://example.org/".into());
        point_at(&mut config, base, dir.path());
        let client = gemini::Client::from_config(&config, false).unwrap();
        let brief = BriefOverrides::default().resolve(false);

        let output = generate(&config, &client, &brief, None).unwrap();
        assert_eq!(output, config.homepage_path());
        let page = fs::read_to_string(&output).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>AI Business Solutions</title>"));
        assert!(page.contains(r#"<base href="https://example.org/">"#));
        assert!(page.contains("<body>\n<h1>Saga Works</h1>\n</body>"));
        assert!(!page.contains("```"));
        assert!(!page.contains("説明です"));

        let seen = server.join().unwrap();
        assert!(seen[0].prompt().contains(&brief.purpose));
    }

    #[test]
    fn brush_up_backs_up_and_rewrites_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let rss = "<rss><channel><title>feed</title><item><title>満月の夜</title></item></channel></rss>";
        let (base, server) = serve(vec![
            (200, rss.to_string()),
            (200, reply("```html\n<!DOCTYPE html><html><body>new</body></html>\n```")),
        ]);
        let mut config = Config::default();
        config.paths.public_dir = dir.path().to_path_buf();
        config.homepage.rss_url = format!("{base}/rss");
        point_at(&mut config, base, dir.path());
        let page = config.homepage_path();
        fs::write(&page, "<!DOCTYPE html><html><body>old</body></html>").unwrap();
        let client = gemini::Client::from_config(&config, false).unwrap();

        assert_eq!(brush_up(&config, &client).unwrap(), page);
        assert_eq!(
            fs::read_to_string(&page).unwrap(),
            "<!DOCTYPE html><html><body>new</body></html>"
        );

        let backups: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().contains(".html.bak_"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(&backups[0]).unwrap(),
            "<!DOCTYPE html><html><body>old</body></html>"
        );

        let seen = server.join().unwrap();
        assert!(seen[0].request_line.starts_with("GET /rss "));
        let prompt = seen[1].prompt();
        assert!(prompt.contains("「満月の夜」"));
        assert!(prompt.contains("<body>old</body>"));
    }
}
