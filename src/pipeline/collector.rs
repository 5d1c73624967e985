use std::path::Path;

use anyhow::Result;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::LookupError;
use crate::pipeline::artifact::RawArtifact;
use crate::reference::ReferenceData;
use crate::scrapers::traits::RegistryApi;
use crate::scrapers::types::{RawResponse, SearchPage, SearchParams};

/// What collecting one subject produced
#[derive(Debug)]
pub enum CollectOutcome {
    /// All pages, persisted
    Collected(RawArtifact),
    /// Nothing listed, or the first page could not be fetched
    NoData,
    /// The registry answered with an error page: its API contract changed
    HardStop(Vec<String>),
}

enum PageBody {
    /// Envelope as received, plus its page count
    Page(Value, u32),
    ErrorPage(Vec<String>),
}

/// Query parameters for one subject, without the page index
pub fn build_query(
    reference: &ReferenceData,
    subject: &str,
    params: &SearchParams,
) -> Result<Vec<(String, String)>, LookupError> {
    let mut query = vec![(
        "dynSubjRF".to_string(),
        reference.subjects.code_for_name(subject)?.to_string(),
    )];

    if let Some(text) = params.text.as_deref().filter(|t| !t.is_empty()) {
        query.push(("text".to_string(), text.to_string()));
    }
    if !params.statuses.is_empty() {
        query.push(("lotStatus".to_string(), params.statuses.join(",")));
    }
    if let Some(category) = params.category.as_deref() {
        query.push((
            "catCode".to_string(),
            reference.categories.code_for_name(category)?.to_string(),
        ));
    }

    Ok(query)
}

/// Human-readable messages of a registry HTML error page
pub fn error_fragments(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.message-text").unwrap();

    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn parse_page(response: &RawResponse) -> PageBody {
    let parsed = serde_json::from_str::<Value>(&response.body).and_then(|raw| {
        let page = SearchPage::deserialize(&raw)?;
        Ok((raw, page.total_pages))
    });

    match parsed {
        Ok((raw, total_pages)) => PageBody::Page(raw, total_pages),
        Err(e) => {
            let mut fragments = error_fragments(&response.body);
            if fragments.is_empty() {
                let head: String = response.body.chars().take(200).collect();
                fragments.push(format!(
                    "Unparseable registry response (status {}, {}): {}",
                    response.status, e, head
                ));
            }
            PageBody::ErrorPage(fragments)
        }
    }
}

/// Fetch every search page for `subject` and persist them as one artifact.
///
/// Pages are requested one after another; the registry is rate sensitive.
pub async fn collect(
    api: &dyn RegistryApi,
    reference: &ReferenceData,
    subject: &str,
    params: &SearchParams,
    artifact_dir: &Path,
    run_stamp: &str,
) -> Result<CollectOutcome> {
    info!("Collecting lots for subject \"{}\" from {}", subject, api.source_name());
    let query = build_query(reference, subject, params)?;

    let first = match api.search_page(&query, 0).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            error!(subject, status = response.status, "first search page rejected");
            return Ok(CollectOutcome::NoData);
        }
        Err(e) => {
            error!(subject, error = %format!("{e:#}"), "first search page failed");
            return Ok(CollectOutcome::NoData);
        }
    };

    let (first, total_pages) = match parse_page(&first) {
        PageBody::Page(raw, total_pages) => (raw, total_pages),
        PageBody::ErrorPage(fragments) => return Ok(CollectOutcome::HardStop(fragments)),
    };

    if total_pages == 0 {
        return Ok(CollectOutcome::NoData);
    }
    info!("Fetched page 1/{}", total_pages);

    let mut pages = Vec::with_capacity(total_pages as usize);
    pages.push(first);

    for page_num in 1..total_pages {
        let response = match api.search_page(&query, page_num).await {
            Ok(response) => response,
            Err(e) => {
                warn!(subject, page = page_num, error = %format!("{e:#}"), "paging stopped early");
                break;
            }
        };
        match parse_page(&response) {
            PageBody::Page(raw, _) => pages.push(raw),
            PageBody::ErrorPage(fragments) => return Ok(CollectOutcome::HardStop(fragments)),
        }
        info!("Fetched page {}/{}", page_num + 1, total_pages);
    }

    let file_name = format!("TORGI_{}_{}.json", subject.replace(' ', "_"), run_stamp);
    let artifact = RawArtifact::create(artifact_dir, &file_name, &pages)?;
    Ok(CollectOutcome::Collected(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{scratch_dir, FakeRegistry};
    use crate::reference::tests::sample;
    use serde_json::json;

    #[test]
    fn query_carries_codes_and_joined_statuses() {
        let query = build_query(&sample(), "Пензенская область", &SearchParams::default()).unwrap();

        assert_eq!(
            query,
            vec![
                ("dynSubjRF".to_string(), "58".to_string()),
                ("lotStatus".to_string(), "APPLICATIONS_SUBMISSION,PUBLISHED".to_string()),
                ("catCode".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_subject_is_a_lookup_error() {
        let err = build_query(&sample(), "Атлантида", &SearchParams::default()).unwrap_err();
        assert_eq!(err.name, "Атлантида");
    }

    #[test]
    fn error_page_fragments_are_extracted() {
        let html = r#"<html><body>
            <div class="message-text"> Сервис временно недоступен </div>
            <div class="other">ignored</div>
            <div class="message-text">Повторите запрос позже</div>
        </body></html>"#;

        assert_eq!(
            error_fragments(html),
            vec!["Сервис временно недоступен", "Повторите запрос позже"]
        );
    }

    #[tokio::test]
    async fn all_pages_are_persisted() {
        let dir = scratch_dir("collect-pages");
        let registry = FakeRegistry::default()
            .with_pages("58", vec![
                json!({"totalPages": 2, "content": [{"id": "a"}]}),
                json!({"totalPages": 2, "content": [{"id": "b"}]}),
            ]);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &dir, "20240101_000000")
            .await
            .unwrap();

        let artifact = match outcome {
            CollectOutcome::Collected(artifact) => artifact,
            other => panic!("expected an artifact, got {other:?}"),
        };
        assert!(artifact.path().ends_with("TORGI_Пензенская_область_20240101_000000.json"));
        let pages: Vec<SearchPage> = serde_json::from_str(&artifact.read().unwrap()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(registry.search_calls(), 2);
    }

    #[tokio::test]
    async fn zero_pages_is_no_data() {
        let registry = FakeRegistry::default().with_pages("58", vec![json!({"totalPages": 0, "content": []})]);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &scratch_dir("collect-empty"), "x")
            .await
            .unwrap();
        assert!(matches!(outcome, CollectOutcome::NoData));
    }

    #[tokio::test]
    async fn rejected_first_page_is_no_data() {
        let registry = FakeRegistry::default().with_status("58", 503);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &scratch_dir("collect-503"), "x")
            .await
            .unwrap();
        assert!(matches!(outcome, CollectOutcome::NoData));
    }

    #[tokio::test]
    async fn html_answer_is_a_hard_stop() {
        let registry = FakeRegistry::default()
            .with_html("58", r#"<div class="message-text">Неверный формат запроса</div>"#);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &scratch_dir("collect-html"), "x")
            .await
            .unwrap();
        match outcome {
            CollectOutcome::HardStop(fragments) => assert_eq!(fragments, vec!["Неверный формат запроса"]),
            other => panic!("expected a hard stop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_page_after_the_first_is_still_a_hard_stop() {
        let dir = scratch_dir("collect-late-html");
        let registry = FakeRegistry::default()
            .with_pages("58", vec![json!({"totalPages": 3, "content": [{"id": "a"}]})])
            .then_html("58", r#"<div class="message-text">Превышен лимит запросов</div>"#);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &dir, "x")
            .await
            .unwrap();

        match outcome {
            CollectOutcome::HardStop(fragments) => assert_eq!(fragments, vec!["Превышен лимит запросов"]),
            other => panic!("expected a hard stop, got {other:?}"),
        }
        assert_eq!(registry.search_calls(), 2);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn dropped_connection_keeps_pages_fetched_so_far() {
        // three pages announced, the fake only serves two
        let registry = FakeRegistry::default().with_pages("58", vec![
            json!({"totalPages": 3, "content": [{"id": "a"}]}),
            json!({"totalPages": 3, "content": [{"id": "b"}]}),
        ]);

        let outcome = collect(&registry, &sample(), "Пензенская область", &SearchParams::default(), &scratch_dir("collect-reset"), "x")
            .await
            .unwrap();

        let artifact = match outcome {
            CollectOutcome::Collected(artifact) => artifact,
            other => panic!("expected an artifact, got {other:?}"),
        };
        let pages: Vec<SearchPage> = serde_json::from_str(&artifact.read().unwrap()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(registry.search_calls(), 3);
    }
}
