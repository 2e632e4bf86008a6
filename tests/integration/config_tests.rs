use search_watcher::models::SelectorType;
use search_watcher::AppConfig;
use std::fs;

const BASE: &str = r#"
[database]
url = "sqlite::memory:"
max_connections = 2

[scraper]
user_agent = "SearchWatcher-Test/1.0"
request_timeout = 10
browser_enabled = false
guard_timeout_ms = 1000

[scheduler]
enabled = true
default_interval = "0 */30 * * * *"

[notifications.smtp]
host = "localhost"
port = 25
from_name = "Search Watcher"
use_tls = false
"#;

fn load(pages: &str) -> anyhow::Result<AppConfig> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("default.toml"), format!("{}\n{}", BASE, pages))?;
    let config_dir = dir.path().to_str().expect("temp path is utf-8").to_string();
    Ok(AppConfig::from_dir(&config_dir)?)
}

#[test]
fn test_search_pages_are_loaded() -> anyhow::Result<()> {
    let config = load(
        r#"
[[search_pages]]
name = "sreality"
url = "https://www.sreality.cz/hledani/prodej/domy"
check_interval = "0 0 * * * *"

[search_pages.rules]
selector_type = "css"
results = "div.property"
url = "h2 a"
omit_classes = "topovana, list_navigation  top_vypis2"

[[search_pages]]
name = "bezrealitky"
url = "https://www.bezrealitky.cz/vypis"

[search_pages.rules]
results = "//article"
javascript_required = true
omit_classes = ["advert", "promo"]
"#,
    )?;

    assert_eq!(config.search_pages.len(), 2);

    let sreality = config.find_page("sreality").unwrap();
    assert_eq!(sreality.rules.selector_type, SelectorType::Css);
    assert_eq!(sreality.rules.url_attribute, "href");
    assert_eq!(sreality.rules.image_attribute, "src");
    assert!(sreality.rules.enabled);
    assert_eq!(
        sreality.rules.omit_classes.iter().collect::<Vec<_>>(),
        vec!["list_navigation", "top_vypis2", "topovana"]
    );

    let bezrealitky = config.find_page("bezrealitky").unwrap();
    assert_eq!(bezrealitky.rules.selector_type, SelectorType::Xpath);
    assert!(bezrealitky.rules.javascript_required);
    assert!(bezrealitky.rules.omits("card advert"));
    assert!(bezrealitky.check_interval.is_none());
    Ok(())
}

#[test]
fn test_enabled_page_without_results_locator_is_rejected() {
    let result = load(
        r#"
[[search_pages]]
name = "sreality"
url = "https://www.sreality.cz/hledani"
"#,
    );

    let message = result.unwrap_err().to_string();
    assert!(message.contains("results locator"), "{}", message);
}

#[test]
fn test_xpath_page_without_javascript_is_rejected() {
    let result = load(
        r#"
[[search_pages]]
name = "remax"
url = "http://localhost:8089/Remax2.html"

[search_pages.rules]
results = "//ul/li"
url = ".//a"
"#,
    );

    let message = result.unwrap_err().to_string();
    assert!(message.contains("javascript_required"), "{}", message);
}

#[test]
fn test_disabled_page_may_omit_results_locator() -> anyhow::Result<()> {
    let config = load(
        r#"
[[search_pages]]
name = "sreality"
url = "https://www.sreality.cz/hledani"

[search_pages.rules]
enabled = false
"#,
    )?;

    assert!(!config.search_pages[0].rules.enabled);
    Ok(())
}

#[test]
fn test_non_http_url_is_rejected() {
    let result = load(
        r#"
[[search_pages]]
name = "local"
url = "file:///tmp/listing.html"

[search_pages.rules]
results = "//li"
"#,
    );

    assert!(result.is_err());
}

#[test]
fn test_no_search_pages_is_valid() -> anyhow::Result<()> {
    let config = load("")?;
    assert!(config.search_pages.is_empty());
    assert!(!config.notifications.smtp.is_configured());
    Ok(())
}
