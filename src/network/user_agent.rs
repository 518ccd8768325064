//! User agent generation

use rand::seq::SliceRandom;

/// Identifier presented by the headless browser. Catalog storefronts serve
/// reduced markup to unknown clients, so this mirrors a current desktop Chrome.
pub const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Generate a random but realistic user agent string
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();

    let chrome_versions = ["120.0.0.0", "121.0.0.0", "122.0.0.0", "123.0.0.0", "124.0.0.0"];
    let firefox_versions = ["121.0", "122.0", "123.0", "124.0"];
    let os_strings = [
        "Windows NT 10.0; Win64; x64",
        "Macintosh; Intel Mac OS X 10_15_7",
        "X11; Linux x86_64",
    ];

    let os = os_strings.choose(&mut rng).copied().unwrap_or(os_strings[0]);

    if rand::random::<f64>() < 0.7 {
        let chrome = chrome_versions
            .choose(&mut rng)
            .copied()
            .unwrap_or(chrome_versions[0]);
        format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
            os, chrome
        )
    } else {
        let firefox = firefox_versions
            .choose(&mut rng)
            .copied()
            .unwrap_or(firefox_versions[0]);
        format!(
            "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
            os, firefox, firefox
        )
    }
}

/// Standard accept headers for HTML requests
pub fn accept_html() -> &'static str {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
}

/// Catalogs in this deployment are German-language first
pub fn accept_language() -> &'static str {
    "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"
}
