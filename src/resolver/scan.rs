//! 在页面开头一段文本里做会员标记和 `rel="noopener"` 链接的扫描

use std::sync::OnceLock;

use regex::Regex;

const MEDIUM_ORIGIN: &str = "https://medium.com";

/// 去掉反引号并 trim
pub fn sanitize_url(raw: &str) -> String {
    raw.replace('`', "").trim().to_string()
}

/// 取 body 的前 limit 个字符
pub fn head_of(body: &str, limit: usize) -> &str {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// 标记为空视为没有会员墙
pub fn contains_marker(head: &str, marker: &str) -> bool {
    !marker.is_empty() && head.contains(marker)
}

/// 找到第一个 rel 恰好为 noopener（忽略大小写）的 `<a>` 并返回 href
pub fn find_noopener_href(head: &str) -> Option<String> {
    static ANCHOR_TAG: OnceLock<Regex> = OnceLock::new();
    static ATTR_REL: OnceLock<Regex> = OnceLock::new();
    static ATTR_HREF: OnceLock<Regex> = OnceLock::new();

    // `<a` 后必须跟空白，排除 <abbr>、<article> 之类
    let anchor_tag = ANCHOR_TAG.get_or_init(|| regex(r"(?is)<a\s[^>]*>", "anchor tag"));
    let attr_rel = ATTR_REL.get_or_init(|| {
        regex(
            r#"(?is)(?:^|\s)rel\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#,
            "rel attr",
        )
    });
    let attr_href = ATTR_HREF.get_or_init(|| {
        regex(
            r#"(?is)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#,
            "href attr",
        )
    });

    anchor_tag.find_iter(head).find_map(|tag| {
        let tag = tag.as_str();
        let rel = attr_value(attr_rel, tag)?;
        if !rel.trim().eq_ignore_ascii_case("noopener") {
            return None;
        }
        let href = attr_value(attr_href, tag)?.trim();
        (!href.is_empty()).then(|| href.to_string())
    })
}

/// 相对路径补全为 medium.com 绝对地址
pub fn normalize_href(href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", MEDIUM_ORIGIN, href)
    } else {
        href.to_string()
    }
}

fn regex(pattern: &'static str, desc: &'static str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid {desc} regex: {err}"))
}

/// 引号、单引号、无引号三种写法取先匹配到的那个
fn attr_value<'t>(re: &Regex, tag: &'t str) -> Option<&'t str> {
    let caps = re.captures(tag)?;
    (1..=3).find_map(|idx| caps.get(idx).map(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_backticks_and_whitespace() {
        assert_eq!(
            sanitize_url("  `https://medium.com/p/abc`\n"),
            "https://medium.com/p/abc"
        );
    }

    #[test]
    fn head_is_bounded_by_characters() {
        assert_eq!(head_of("abcdef", 3), "abc");
        assert_eq!(head_of("abc", 10), "abc");
        assert_eq!(head_of("日本語テキスト", 3), "日本語");
        assert_eq!(head_of("abc", 0), "");
    }

    #[test]
    fn empty_marker_never_matches() {
        assert!(!contains_marker("Member-only story", ""));
        assert!(contains_marker("<p>Member-only story</p>", "Member-only story"));
    }

    #[test]
    fn finds_noopener_anchor_with_attributes_in_any_order() {
        let html = r#"<a href="/other" rel="nofollow">x</a>
            <A class="btn" HREF='/p/abc' REL="NoOpener">Read</A>"#;
        assert_eq!(find_noopener_href(html).as_deref(), Some("/p/abc"));
    }

    #[test]
    fn rel_must_be_exactly_noopener() {
        let html = r#"<a rel="noopener noreferrer" href="/p/one">x</a>"#;
        assert_eq!(find_noopener_href(html), None);
    }

    #[test]
    fn skips_tags_that_only_start_with_a() {
        let html = r#"<abbr rel="noopener" href="/nope">x</abbr><a rel=noopener href=/p/ok>y</a>"#;
        assert_eq!(find_noopener_href(html).as_deref(), Some("/p/ok"));
    }

    #[test]
    fn prefixed_attribute_names_are_not_rel() {
        let html = r#"<a data-rel="noopener" href="/p/no">x</a><a
            rel="noopener"
            href="/p/multiline">y</a>"#;
        assert_eq!(find_noopener_href(html).as_deref(), Some("/p/multiline"));
    }

    #[test]
    fn anchor_without_href_is_ignored() {
        assert_eq!(find_noopener_href(r#"<a rel="noopener">x</a>"#), None);
    }

    #[test]
    fn relative_hrefs_are_prefixed_with_medium() {
        assert_eq!(normalize_href("/p/abc"), "https://medium.com/p/abc");
        assert_eq!(
            normalize_href("https://external.com/x"),
            "https://external.com/x"
        );
    }
}
