use tracing::{info, warn};

use crate::{
    config::DesignSettings,
    gemini::{GeminiError, ImageGenerator},
    models::{DataUri, DesignRequest, GenerationResult},
    prompts::{build_design_prompt, build_edit_prompt},
    retry::generate_with_retry,
};

/// Generates `count` variations one after another.
///
/// Requests are issued sequentially to keep load on the image API flat. A
/// variation that produces nothing after its retries is left out; the rest
/// keep their index order.
pub async fn generate_designs(
    generator: &dyn ImageGenerator,
    request: &DesignRequest,
    count: usize,
    settings: &DesignSettings,
) -> Vec<GenerationResult> {
    info!("🚀 Generating {} design variations for a {} ({} floors)", count, request.house_type, request.floors);

    let mut results = Vec::with_capacity(count);
    for index in 0..count {
        let prompt = build_design_prompt(request, index, &settings.variations, &settings.aspect_ratio);
        match generate_with_retry(generator, &request.image, &prompt, &settings.aspect_ratio, &settings.retry).await {
            Some(result) => {
                let description = result
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("Variation {}", index + 1));
                info!("✅ Variation {} generated: {}", index + 1, result.image.preview());
                results.push(GenerationResult { variation: index, image: result.image, description: Some(description) });
            }
            None => warn!("❌ Variation {} produced no image, skipping", index + 1),
        }
    }

    info!("✅ {} of {} variations generated", results.len(), count);
    results
}

/// Reworks an existing rendering. One attempt, faults go to the caller.
pub async fn edit_design(
    generator: &dyn ImageGenerator,
    current: &DataUri,
    instruction: &str,
    aspect_ratio: &str,
) -> Result<Option<DataUri>, GeminiError> {
    let prompt = build_edit_prompt(instruction, aspect_ratio);
    let result = generator.generate_image(current, &prompt, aspect_ratio).await?;
    Ok(result.map(|r| r.image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{DesignStyle, HouseType},
        retry::{
            tests::{rendered, ScriptedGenerator},
            RetryPolicy,
        },
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn request() -> DesignRequest {
        DesignRequest {
            house_type: HouseType::Townhouse,
            style: DesignStyle::Modern,
            budget: "2.5".into(),
            land_width: "5".into(),
            land_length: "20".into(),
            floors: "2".into(),
            front_yard: "3".into(),
            image: DataUri::from_bytes("image/png", b"plot"),
            birth_date: None,
        }
    }

    fn fast_settings() -> DesignSettings {
        DesignSettings {
            retry: RetryPolicy { max_retries: 2, delay: Duration::ZERO },
            ..DesignSettings::default()
        }
    }

    /// Answers by the "OPTION n" marker in the prompt; fails for options listed in `broken`.
    struct ByOption {
        broken: Vec<usize>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageGenerator for ByOption {
        async fn generate_image(
            &self,
            _source: &DataUri,
            prompt: &str,
            _aspect_ratio: &str,
        ) -> Result<Option<GenerationResult>, GeminiError> {
            self.prompts.lock().push(prompt.to_string());
            let option = (1..=9).find(|n| prompt.contains(&format!("(OPTION {n})"))).unwrap_or(0);
            if self.broken.contains(&option) {
                return Err(GeminiError::Http("connection reset".into()));
            }
            Ok(Some(GenerationResult {
                variation: 0,
                image: DataUri::from_bytes("image/png", format!("option-{option}").as_bytes()),
                description: (option == 1).then(|| "Glass and marble.".to_string()),
            }))
        }
    }

    #[tokio::test]
    async fn failed_variation_is_omitted_and_order_kept() {
        let generator = ByOption { broken: vec![2], prompts: Mutex::new(vec![]) };
        let results = generate_designs(&generator, &request(), 3, &fast_settings()).await;

        let variations: Vec<usize> = results.iter().map(|r| r.variation).collect();
        assert_eq!(variations, vec![0, 2]);
        assert_eq!(results[1].image, DataUri::from_bytes("image/png", b"option-3"));
        // 1 + 3 attempts for the broken one + 1
        assert_eq!(generator.prompts.lock().len(), 5);
    }

    #[tokio::test]
    async fn all_succeed_in_index_order_with_placeholder_descriptions() {
        let generator = ByOption { broken: vec![], prompts: Mutex::new(vec![]) };
        let results = generate_designs(&generator, &request(), 3, &fast_settings()).await;

        assert_eq!(results.len(), 3);
        let descriptions: Vec<_> = results.iter().map(|r| r.description.clone().unwrap()).collect();
        assert_eq!(descriptions, vec!["Glass and marble.", "Variation 2", "Variation 3"]);

        let prompts = generator.prompts.lock();
        let variations = DesignSettings::default().variations;
        for (index, prompt) in prompts.iter().enumerate() {
            assert!(prompt.ends_with(&variations[index % 3]));
        }
    }

    #[tokio::test]
    async fn count_beyond_fragment_list_cycles() {
        let generator = ByOption { broken: vec![], prompts: Mutex::new(vec![]) };
        let results = generate_designs(&generator, &request(), 5, &fast_settings()).await;
        assert_eq!(results.len(), 5);
        let prompts = generator.prompts.lock();
        assert!(prompts[3].ends_with(&DesignSettings::default().variations[0]));
    }

    #[tokio::test]
    async fn edit_returns_the_image_part() {
        let generator = ScriptedGenerator::new(vec![Ok(Some(rendered("edited")))]);
        let current = DataUri::from_bytes("image/png", b"before");
        let edited = edit_design(&generator, &current, "add a balcony light", "9:16").await.unwrap();
        assert_eq!(edited, Some(DataUri::from_bytes("image/png", b"edited")));
    }

    #[tokio::test]
    async fn edit_without_image_is_none_and_faults_propagate() {
        let current = DataUri::from_bytes("image/png", b"before");

        let text_only = ScriptedGenerator::new(vec![Ok(None)]);
        assert_eq!(edit_design(&text_only, &current, "x", "9:16").await.unwrap(), None);

        let failing = ScriptedGenerator::new(vec![Err(GeminiError::Api { status: 500, body: "boom".into() })]);
        assert!(edit_design(&failing, &current, "x", "9:16").await.is_err());
        assert_eq!(*failing.calls.lock(), 1);
    }
}
