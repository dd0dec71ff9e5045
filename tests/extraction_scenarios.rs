//! Detail-page extraction across common directory layouts

use directory_crawler::domain::extraction::ExtractionSource;
use directory_crawler::domain::hints::SiteHintsConfig;
use directory_crawler::infrastructure::{FieldExtractor, ItemDetector};
use directory_crawler::{FieldSchema, Page};
use rstest::rstest;

fn page(url: &str, body: &str) -> Page {
    Page::new(url, format!("<html><head><title>Profile</title></head><body>{body}</body></html>"), false).unwrap()
}

#[test]
fn inline_email_label_is_found_by_proximity() {
    let schema = FieldSchema::from_json_str(r#"{"email": "email"}"#).unwrap();
    let results = FieldExtractor::new().extract_heuristic(
        &page("https://example.edu/people/jane", "<p>Email: jane@example.edu</p>"),
        &schema,
        None,
    );

    let email = results.get("email").unwrap();
    assert_eq!(email.value.as_deref(), Some("jane@example.edu"));
    assert_eq!(email.source, Some(ExtractionSource::LabelProximity));
    assert!(email.confidence >= 0.6);
    assert!(email.is_accepted());
}

#[rstest]
#[case::paragraph("<p>E-mail: jane@example.edu</p>")]
#[case::definition_list("<dl><dt>Email</dt><dd>jane@example.edu</dd></dl>")]
#[case::table_row("<table><tr><th>Email address</th><td>jane@example.edu</td></tr></table>")]
#[case::labelled_mailto(r#"<div><strong>Contact:</strong> <a href="mailto:jane@example.edu">Send mail</a></div>"#)]
fn email_layouts(#[case] body: &str) {
    let schema = FieldSchema::from_json_str(r#"{"email": "email"}"#).unwrap();
    let results = FieldExtractor::new().extract_heuristic(&page("https://example.edu/people/jane", body), &schema, None);

    let email = results.get("email").unwrap();
    assert!(email.value.as_deref().unwrap().ends_with("jane@example.edu"));
    assert_eq!(email.source, Some(ExtractionSource::LabelProximity));
    assert!(email.confidence >= 0.6 && email.confidence <= 0.8);
}

#[test]
fn schema_synonyms_extend_the_label_pattern() {
    let schema = FieldSchema::from_json_str(
        r#"[{"name": "office_line", "type": "phone", "synonyms": ["direct line"]}]"#,
    )
    .unwrap();
    let results = FieldExtractor::new().extract_heuristic(
        &page("https://example.edu/people/jane", "<p>Direct line: (555) 222-3333</p>"),
        &schema,
        None,
    );

    let phone = results.get("office_line").unwrap();
    assert_eq!(phone.value.as_deref(), Some("(555) 222-3333"));
    assert_eq!(phone.source, Some(ExtractionSource::LabelProximity));
}

#[test]
fn hinted_synonyms_apply_per_site() {
    let hints = SiteHintsConfig::from_json_str(r#"{"label_synonyms": {"title": ["rank"]}}"#)
        .unwrap()
        .compile()
        .unwrap();
    let schema = FieldSchema::from_json_str(r#"{"title": "str"}"#).unwrap();
    let profile = page("https://example.edu/people/jane", "<p>Rank: Associate Professor</p>");

    let without = FieldExtractor::new().extract_heuristic(&profile, &schema, None);
    let with = FieldExtractor::new().extract_heuristic(&profile, &schema, Some(&hints));

    assert!(!without.get("title").unwrap().is_accepted());
    assert_eq!(with.get("title").unwrap().value.as_deref(), Some("Associate Professor"));
}

#[test]
fn detector_and_extractor_share_hints() {
    let hints = SiteHintsConfig::from_json_str(
        r#"{
            "list_item_selector": ".staff-card",
            "detail_link_selector": "a.profile",
            "fields": {"name": ".staff-name"}
        }"#,
    )
    .unwrap()
    .compile()
    .unwrap();

    let listing = page(
        "https://example.edu/staff",
        r#"<div class="staff-card"><a class="photo" href="/img/1.jpg">photo</a><a class="profile" href="/staff/ann">Ann</a></div>
           <div class="staff-card"><a class="profile" href="/staff/bo?sessionid=9">Bo</a></div>"#,
    );
    let items = ItemDetector::new().detect(&listing, Some(&hints));
    let urls: Vec<&str> = items.iter().map(|item| item.detail_url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.edu/staff/ann", "https://example.edu/staff/bo"]);

    let schema = FieldSchema::from_json_str(r#"{"name": "str"}"#).unwrap();
    let detail = page(
        "https://example.edu/staff/ann",
        r#"<h1>Staff Directory</h1><span class="staff-name">Ann  Smith</span>"#,
    );
    let results = FieldExtractor::new().extract_heuristic(&detail, &schema, Some(&hints));
    let name = results.get("name").unwrap();
    assert_eq!(name.value.as_deref(), Some("Ann Smith"));
    assert_eq!(name.source, Some(ExtractionSource::Selector));
}
