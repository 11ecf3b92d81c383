//! HTML 텍스트 추출
//!
//! 저장된 웹 페이지(.html)에서 제목과 본문 텍스트만 남깁니다.

use scraper::{ElementRef, Html, Selector};

/// HTML에서 추출한 제목과 본문
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlText {
    pub title: Option<String>,
    pub body: String,
}

/// HTML 문서에서 텍스트 추출
pub fn extract_html(html: &str) -> HtmlText {
    let document = Html::parse_document(html);
    HtmlText {
        title: extract_title(&document),
        body: extract_body(&document),
    }
}

/// 제목 추출 (<title> → <h1>)
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].into_iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let title = element.text().collect::<String>().trim().to_string();
        (!title.is_empty()).then_some(title)
    })
}

/// 본문 추출
///
/// 우선순위: article > main > [role=main] > #content > body.
/// 100자 미만인 후보는 건너뛰고, 모두 짧으면 body 전체를 사용합니다.
fn extract_body(document: &Html) -> String {
    const CANDIDATES: [&str; 5] = ["article", "main", "[role=main]", "#content", "body"];

    for selector_str in CANDIDATES {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element_text(&element);
                if text.len() > 100 {
                    return text;
                }
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(|e| element_text(&e)))
        .unwrap_or_default()
}

/// 텍스트를 남기지 않는 태그
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// 앞뒤로 문단 경계를 두는 블록 태그
const BLOCK_TAGS: [&str; 24] = [
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "div", "br", "tr", "table",
    "section", "article", "main", "header", "footer", "aside", "blockquote", "pre", "figure",
    "dd",
];

/// 요소의 텍스트 추출 (script/style 제외)
///
/// 인라인 텍스트는 공백 하나로 잇고, 블록 요소 사이에는 빈 줄(`\n\n`)을 둡니다.
/// 청커가 문단 단위로 나눌 수 있도록 문서 구조를 보존합니다.
fn element_text(element: &ElementRef) -> String {
    let mut out = String::new();
    collect_text(*element, &mut out);
    out.trim().to_string()
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_words(out, text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED_TAGS.contains(&name) {
            continue;
        }
        let block = BLOCK_TAGS.contains(&name);
        if block {
            push_break(out);
        }
        collect_text(child, out);
        if block {
            push_break(out);
        }
    }
}

fn push_words(out: &mut String, text: &str) {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
        out.push(' ');
    }
    for (i, word) in words.enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(word);
    }
}

fn push_break(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push_str("\n\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        let html = r#"
            <html>
                <head><title>Roblox Update</title></head>
                <body><h1>Main Heading</h1></body>
            </html>
        "#;
        assert_eq!(extract_html(html).title, Some("Roblox Update".to_string()));
    }

    #[test]
    fn test_extract_title_h1_fallback() {
        let html = "<html><head><title></title></head><body><h1>H1 Heading</h1></body></html>";
        assert_eq!(extract_html(html).title, Some("H1 Heading".to_string()));
    }

    #[test]
    fn test_extract_body_prefers_article() {
        let html = r#"
            <html>
                <body>
                    <nav>Navigation menu</nav>
                    <article>
                        Maybelline opened a virtual beauty experience inside Roblox.
                        Players can try on makeup looks for their avatars.
                        The campaign ran through the holiday season.
                    </article>
                    <footer>Footer content</footer>
                </body>
            </html>
        "#;
        let text = extract_html(html);
        assert!(text.body.contains("virtual beauty experience"));
        assert!(!text.body.contains("Navigation menu"));
    }

    #[test]
    fn test_extract_body_skips_scripts() {
        let html = r#"<html><body><p>Short page</p><script>var x = 1;</script></body></html>"#;
        let text = extract_html(html);
        assert_eq!(text.body, "Short page");
    }

    #[test]
    fn test_extract_body_keeps_paragraphs() {
        let html = r#"
            <html><body><article>
                <h2>Campaign</h2>
                <p>Maybelline opened a <b>virtual</b> store.</p>
                <p>Players tried makeup<br>on their avatars.</p>
                <ul><li>First look</li><li>Second look</li></ul>
            </article></body></html>
        "#;
        let text = extract_html(html);
        assert_eq!(
            text.body,
            "Campaign\n\nMaybelline opened a virtual store.\n\nPlayers tried makeup\n\non their avatars.\n\nFirst look\n\nSecond look"
        );
    }
}
