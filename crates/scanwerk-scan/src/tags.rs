// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tolerant XML tag extraction.
//
// Scanners answer with a handful of well-known elements buried in large SOAP
// or eSCL documents, under whatever namespace prefix the firmware picked.
// These helpers find element text by substring search instead of parsing
// the document, so they never reject a response that merely has an odd
// prolog, unknown namespaces or trailing garbage.

use std::borrow::Cow;

/// Text between `<tag>` and the following `</tag>`, matching the qualified
/// name exactly (e.g. `wscn:JobId`). Not trimmed.
pub fn extract_tag<'a>(data: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = data.find(&open)? + open.len();
    let len = data[start..].find(&close)?;
    Some(&data[start..start + len])
}

/// Trimmed text of the first element whose local name is `local_name`,
/// with or without a namespace prefix and with any attributes.
///
/// `extract_element("<wsdp:ModelName>Foo</wsdp:ModelName>", "ModelName")`
/// and `extract_element("<ModelName>Foo</ModelName>", "ModelName")` both
/// return `Some("Foo")`.
pub fn extract_element<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    elements(xml, local_name).next().map(str::trim)
}

/// Raw (untrimmed) content of every element whose local name is
/// `local_name`, in document order. Nested elements of the same name are
/// not supported.
pub fn elements<'a, 'n>(xml: &'a str, local_name: &'n str) -> Elements<'a, 'n> {
    Elements {
        xml,
        local_name,
        pos: 0,
    }
}

/// Iterator returned by [`elements`].
pub struct Elements<'a, 'n> {
    xml: &'a str,
    local_name: &'n str,
    pos: usize,
}

impl<'a> Iterator for Elements<'a, '_> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while let Some(rel) = self.xml[self.pos..].find('<') {
            let open = self.pos + rel;
            self.pos = open + 1;

            let after = &self.xml[open + 1..];
            let name_len = after
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(after.len());
            let qname = &after[..name_len];
            if qname.is_empty() || qname.starts_with(['?', '!']) || local_part(qname) != self.local_name {
                continue;
            }

            let tag_end = open + self.xml[open..].find('>')?;
            if self.xml[..tag_end].ends_with('/') {
                self.pos = tag_end + 1;
                return Some("");
            }

            let content_start = tag_end + 1;
            let rest = &self.xml[content_start..];
            let qualified_close = format!("</{qname}>");
            let local_close = format!("</{}>", self.local_name);
            let found = rest
                .find(&qualified_close)
                .map(|i| (i, qualified_close.len()))
                .or_else(|| rest.find(&local_close).map(|i| (i, local_close.len())));

            if let Some((len, close_len)) = found {
                self.pos = content_start + len + close_len;
                return Some(&rest[..len]);
            }
        }
        None
    }
}

/// Decode the five predefined XML entities. Unknown entities are kept
/// as they are.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let decoded = ENTITIES
            .iter()
            .find(|(entity, _)| rest.starts_with(entity));
        match decoded {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

const ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
];

fn local_part(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_tag_with_prefix() {
        let body = "<wscn:JobId>42</wscn:JobId><wscn:JobToken>tok</wscn:JobToken>";
        assert_eq!(extract_tag(body, "wscn:JobId"), Some("42"));
        assert_eq!(extract_tag(body, "wscn:JobToken"), Some("tok"));
        assert_eq!(extract_tag(body, "JobId"), None);
    }

    #[test]
    fn exact_tag_missing_close() {
        assert_eq!(extract_tag("<a>unterminated", "a"), None);
    }

    #[test]
    fn element_with_and_without_prefix() {
        assert_eq!(
            extract_element("<wsdp:ModelName>Foo</wsdp:ModelName>", "ModelName"),
            Some("Foo")
        );
        assert_eq!(extract_element("<ModelName>Bar</ModelName>", "ModelName"), Some("Bar"));
    }

    #[test]
    fn element_with_attributes_and_whitespace() {
        let xml = r#"<wsdp:ModelName xml:lang="en-US">
            OfficeJet 9010
        </wsdp:ModelName>"#;
        assert_eq!(extract_element(xml, "ModelName"), Some("OfficeJet 9010"));
    }

    #[test]
    fn longer_names_do_not_match() {
        let xml = "<ModelNameExtra>no</ModelNameExtra><pwg:ModelName>yes</pwg:ModelName>";
        assert_eq!(extract_element(xml, "ModelName"), Some("yes"));
    }

    #[test]
    fn mismatched_prefix_falls_back_to_local_close() {
        assert_eq!(extract_element("<a:Address>x</Address>", "Address"), Some("x"));
    }

    #[test]
    fn self_closing_element_is_empty() {
        assert_eq!(extract_element("<scan:Note/>", "Note"), Some(""));
    }

    #[test]
    fn missing_element() {
        assert_eq!(extract_element("<soap:Body />", "ModelName"), None);
    }

    #[test]
    fn iterates_every_hosted_block() {
        let xml = "<wsdp:Hosted><a>1</a></wsdp:Hosted><x/><Hosted><a>2</a></Hosted>";
        let blocks: Vec<_> = elements(xml, "Hosted").collect();
        assert_eq!(blocks, vec!["<a>1</a>", "<a>2</a>"]);
    }

    #[test]
    fn element_name_borrow_is_independent() {
        let xml = String::from("<Address>ep</Address>");
        let found = {
            let name = String::from("Address");
            extract_element(&xml, &name)
        };
        assert_eq!(found, Some("ep"));
    }

    #[test]
    fn predefined_entities_are_decoded() {
        assert_eq!(unescape("a&amp;b"), "a&b");
        assert_eq!(unescape("&lt;x&gt; &quot;q&quot; &apos;s&apos;"), "<x> \"q\" 's'");
        assert_eq!(unescape("&amp;amp;"), "&amp;");
        assert_eq!(unescape("fish &chips; & co"), "fish &chips; & co");
        assert!(matches!(unescape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn ignores_declarations_and_closing_tags() {
        let xml = r#"<?xml version="1.0"?><!-- ModelName --></ModelName><ModelName>ok</ModelName>"#;
        assert_eq!(extract_element(xml, "ModelName"), Some("ok"));
    }
}
