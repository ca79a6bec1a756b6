use tracing::{error, info};

use crate::{config::FengShuiSettings, gemini::TextGenerator, models::FengShuiReport, prompts::build_feng_shui_prompt};

pub const FALLBACK_TEXT: &str = "Unable to analyse feng shui right now. Please try again later.";

pub fn pending_text(target_year: i32) -> String {
    format!("Feng shui guidance for {target_year} is still being prepared...")
}

/// Asks for construction-timing advice for someone born on `birth_date`.
/// Never fails; provider faults turn into [`FALLBACK_TEXT`].
pub async fn analyze_feng_shui(
    generator: &dyn TextGenerator,
    birth_date: &str,
    settings: &FengShuiSettings,
) -> FengShuiReport {
    let prompt = build_feng_shui_prompt(birth_date, settings.target_year, &settings.language);
    info!("🧭 Requesting feng shui analysis for target year {}", settings.target_year);

    match generator.generate_text(&prompt).await {
        Ok(text) if text.trim().is_empty() => {
            info!("Feng shui analysis came back empty");
            FengShuiReport { text: pending_text(settings.target_year), fallback: false }
        }
        Ok(text) => {
            info!("✅ Feng shui analysis received ({} chars)", text.len());
            FengShuiReport { text, fallback: false }
        }
        Err(e) => {
            error!("❌ Feng shui analysis failed: {}", e);
            FengShuiReport { text: FALLBACK_TEXT.to_string(), fallback: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct CannedText {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for CannedText {
        async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
            self.prompts.lock().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| GeminiError::Http("dns failure".into()))
        }
    }

    fn canned(reply: Option<&str>) -> CannedText {
        CannedText { reply: reply.map(str::to_string), prompts: Mutex::new(vec![]) }
    }

    #[tokio::test]
    async fn one_request_with_date_and_year_and_fallback_on_failure() {
        let generator = canned(None);
        let report = analyze_feng_shui(&generator, "1990-05-15", &FengShuiSettings::default()).await;

        assert_eq!(report, FengShuiReport { text: FALLBACK_TEXT.to_string(), fallback: true });
        let prompts = generator.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("1990-05-15"));
        assert!(prompts[0].contains("2026"));
    }

    #[tokio::test]
    async fn text_is_returned_verbatim() {
        let generator = canned(Some("  Element: Metal 🪙\nBreak ground in March.  "));
        let report = analyze_feng_shui(&generator, "1985-01-01", &FengShuiSettings::default()).await;
        assert_eq!(report.text, "  Element: Metal 🪙\nBreak ground in March.  ");
        assert!(!report.fallback);
    }

    #[tokio::test]
    async fn empty_text_gets_placeholder() {
        let generator = canned(Some(""));
        let settings = FengShuiSettings { target_year: 2030, ..FengShuiSettings::default() };
        let report = analyze_feng_shui(&generator, "1985-01-01", &settings).await;
        assert_eq!(report.text, pending_text(2030));
        assert!(report.text.contains("2030"));
        // the provider answered, so this is not the outage fallback
        assert!(!report.fallback);
    }
}
