use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chatscope_automator::{
    inspect_page, AiChatAutomator, ChatAutomator, ChatMessage, ChatRecord, ChatState, SiteVariant,
};
use chatscope_core::{AiAssistantPageSpec, AiAssistantSiteSpec, Error, WaitState};
use chatscope_extract::Extractor;
use chatscope_fixture::{Fixture, HtmlPage, Interaction};

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn page_spec(json: serde_json::Value) -> AiAssistantPageSpec {
    serde_json::from_value(json).unwrap()
}

fn composer_spec() -> AiAssistantPageSpec {
    page_spec(serde_json::json!({
        "elements": {
            "loginIndicator": { "selector": "#avatar" },
            "newChatButton": { "selector": ["#new-chat", "a.new"] },
            "recentChatLinks": { "selector": "nav a" },
            "messageInputArea": { "selector": "#box" },
            "messageSubmitButton": { "selector": "#send" },
            "messageBlocks": {
                "selector": ".msg",
                "fields": { "text": { "selector": "p" } }
            },
            "aiGeneratingIndicator": { "selector": ".spinner" }
        }
    }))
}

const COMPOSER_PAGE: &str = r#"
<html><body>
  <a class="new" href="/">New</a>
  <nav><a href="/c/1">One</a><a href="/c/2">Two</a></nav>
  <div class="msg"><p>hello</p></div>
  <textarea id="box"></textarea>
  <button id="send">Send</button>
</body></html>
"#;

#[tokio::test]
async fn test_send_message_fills_then_clicks_once() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    automator.send_message("hi").await.unwrap();

    assert_eq!(page.filled_value("#box").as_deref(), Some("hi"));
    assert_eq!(page.click_count("#send"), 1);
    assert_eq!(
        page.interactions(),
        vec![
            Interaction::Fill {
                target: "css=#box".into(),
                text: "hi".into()
            },
            Interaction::Click {
                target: "css=#send".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_send_empty_message_is_forwarded() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    automator.send_message("").await.unwrap();
    assert_eq!(page.filled_value("#box").as_deref(), Some(""));
    assert_eq!(page.click_count("#send"), 1);
}

#[tokio::test]
async fn test_send_message_checks_spec_before_touching_page() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let spec = page_spec(serde_json::json!({
        "elements": { "messageInputArea": { "selector": "#box" } }
    }));
    let automator = ChatAutomator::new(page.clone(), spec);

    let err = automator.send_message("hi").await.unwrap_err();
    assert!(matches!(err, Error::MissingElement { ref element } if element == "messageSubmitButton"));
    assert!(err.is_configuration());
    assert!(page.interactions().is_empty());
}

#[tokio::test]
async fn test_missing_configuration_errors() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page, AiAssistantPageSpec::default());

    assert!(matches!(
        automator.start_new_chat().await,
        Err(Error::MissingElement { .. })
    ));
    assert!(matches!(
        automator.open_chat(None).await,
        Err(Error::MissingElement { .. })
    ));
    assert!(matches!(
        automator.wait_for_login(Some(Duration::from_millis(10))).await,
        Err(Error::MissingElement { .. })
    ));

    assert!(!automator.check_login_status().await.unwrap());
    assert_eq!(automator.get_chat_state().await.unwrap(), ChatState::Idle);
    assert!(automator.get_messages().await.unwrap().is_empty());
    automator.wait_for_response(None).await.unwrap();
}

#[tokio::test]
async fn test_new_chat_uses_fallback_and_open_chat_uses_index() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    automator.start_new_chat().await.unwrap();
    automator.open_chat(Some(1)).await.unwrap();
    automator.open_chat(None).await.unwrap();

    assert_eq!(
        page.interactions(),
        vec![
            Interaction::Click {
                target: "css=a.new".into()
            },
            Interaction::Click {
                target: "css=nav a >> nth=1".into()
            },
            Interaction::Click {
                target: "css=nav a >> nth=0".into()
            },
        ]
    );

    let err = automator.open_chat(Some(9)).await.unwrap_err();
    assert!(matches!(err, Error::ElementNotFound(_)));
}

#[tokio::test]
async fn test_login_status_and_chat_state_follow_dom() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    assert!(!automator.check_login_status().await.unwrap());
    assert_eq!(automator.get_chat_state().await.unwrap(), ChatState::Idle);

    page.set_html(r#"<img id="avatar"><div class="spinner"></div><div class="spinner"></div>"#);
    assert!(automator.check_login_status().await.unwrap());
    assert_eq!(automator.get_chat_state().await.unwrap(), ChatState::Generating);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_response_swallows_timeout() {
    let page = Arc::new(HtmlPage::new(r#"<div class="spinner"></div>"#));
    let automator = ChatAutomator::new(page, composer_spec());

    let started = tokio::time::Instant::now();
    automator
        .wait_for_response(Some(Duration::from_secs(3)))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(automator.get_chat_state().await.unwrap(), ChatState::Generating);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_response_returns_when_indicator_detaches() {
    let page = Arc::new(HtmlPage::new(r#"<div class="spinner"></div>"#));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    let swapper = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        swapper.set_html(r#"<div class="msg"><p>done</p></div>"#);
    });

    let started = tokio::time::Instant::now();
    automator.wait_for_response(None).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(automator.get_chat_state().await.unwrap(), ChatState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_login_times_out() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page, composer_spec());

    let err = automator
        .wait_for_login(Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout {
            state: WaitState::Visible,
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_login_sees_hidden_avatar_become_visible() {
    let page = Arc::new(HtmlPage::new(r#"<img id="avatar" hidden>"#));
    let automator = ChatAutomator::new(page.clone(), composer_spec());

    let swapper = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        swapper.set_html(r#"<img id="avatar">"#);
    });

    automator.wait_for_login(None).await.unwrap();
}

#[tokio::test]
async fn test_raw_messages_pass_through_for_generic_sites() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let automator = ChatAutomator::new(page, composer_spec());

    let messages = automator.get_messages().await.unwrap();
    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        serde_json::json!([{ "text": ["hello"] }])
    );
}

#[tokio::test]
async fn test_extra_elements_are_read_on_request() {
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let mut spec = composer_spec();
    spec.elements
        .extra
        .insert("chatTitles".into(), chatscope_core::SelectorDef::new("nav a"));
    let automator = ChatAutomator::new(page, spec);

    let titles = automator.extract_element("chatTitles").await.unwrap();
    assert_eq!(titles.len(), 2);
    assert!(matches!(
        automator.extract_element("sidebarToggle").await,
        Err(Error::MissingElement { .. })
    ));
}

#[tokio::test]
async fn test_grok_fixture_end_to_end() {
    let site = AiAssistantSiteSpec::load(&data_dir().join("grok.json")).unwrap();
    let fixtures = Fixture::discover(&data_dir().join("fixtures")).unwrap();
    assert_eq!(fixtures.len(), 1);
    let fixture = &fixtures[0];
    assert_eq!(fixture.page_role(), "chat");

    let page = Arc::new(fixture.page());
    let automator = ChatAutomator::for_url(page, &site, &fixture.metadata.url).unwrap();
    assert_eq!(automator.variant(), SiteVariant::Grok);

    let messages = automator.get_messages().await.unwrap();
    assert_eq!(
        messages[..3],
        [
            ChatRecord::Message(ChatMessage::user("Plan a weekend in Lisbon")),
            ChatRecord::Message(ChatMessage::user("Budget is 300 EUR")),
            ChatRecord::Message(ChatMessage::assistant(
                "Day one: Alfama and the castle.\n\nDay two: Belem and pasteis."
            )),
        ]
    );
    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        fixture.expected_messages.clone().unwrap()
    );

    let raw = automator.get_raw_messages().await.unwrap();
    assert_eq!(raw.len(), 2);
}

#[tokio::test]
async fn test_snapshot_records_each_call() {
    let site = AiAssistantSiteSpec::load(&data_dir().join("grok.json")).unwrap();
    let fixtures = Fixture::discover(&data_dir().join("fixtures")).unwrap();
    let page = Arc::new(fixtures[0].page());

    let automator = ChatAutomator::for_site(page, &site, "chat")
        .unwrap()
        .with_variant(SiteVariant::Grok);
    let snapshot = serde_json::to_value(automator.snapshot().await).unwrap();

    assert_eq!(snapshot["site"], "grok");
    assert_eq!(snapshot["checkLoginStatus"]["result"], true);
    assert_eq!(snapshot["getChatState"]["result"], "idle");
    assert_eq!(snapshot["getMessages"]["success"], true);
    assert_eq!(snapshot["getMessages"]["result"]["count"], 5);
}

#[tokio::test]
async fn test_for_site_rejects_unknown_page() {
    let site = AiAssistantSiteSpec::load(&data_dir().join("grok.json")).unwrap();
    let page = Arc::new(HtmlPage::new(COMPOSER_PAGE));
    let err = ChatAutomator::for_site(page.clone(), &site, "settings")
        .err()
        .unwrap();
    assert!(err.is_configuration());

    assert!(ChatAutomator::for_url(page, &site, "https://chatgpt.com/").is_err());
}

#[tokio::test]
async fn test_coverage_report_for_fixture() {
    let site = AiAssistantSiteSpec::load(&data_dir().join("grok.json")).unwrap();
    let fixtures = Fixture::discover(&data_dir().join("fixtures")).unwrap();
    let page = fixtures[0].page();

    let chat = site.page("chat").unwrap();
    let report = inspect_page(&page, chat, "chat", &Extractor::default())
        .await
        .unwrap();
    assert!(report.is_complete(), "failures: {:?}", report.failures());

    let login = report
        .elements
        .iter()
        .find(|e| e.name == "loginIndicator")
        .unwrap();
    assert_eq!(login.candidate, 0);
    assert_eq!(login.count, 1);

    let links = report
        .elements
        .iter()
        .find(|e| e.name == "recentChatLinks")
        .unwrap();
    assert_eq!(links.samples, vec!["Weekend trip", "Rust lifetimes"]);

    let share = report
        .elements
        .iter()
        .find(|e| e.name == "shareButton")
        .unwrap();
    assert!(!share.required);
    assert_eq!(share.count, 0);

    let blocks = report
        .elements
        .iter()
        .find(|e| e.name == "messageBlocks")
        .unwrap();
    assert_eq!(blocks.fields.as_ref().map(Vec::len), Some(2));

    let landing_only = AiAssistantPageSpec::default();
    let report = inspect_page(&page, &landing_only, "landing", &Extractor::default())
        .await
        .unwrap();
    assert_eq!(report.undefined.len(), 5);
    assert!(!report.is_complete());
}
