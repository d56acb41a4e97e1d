use std::sync::OnceLock;

use regex::Regex;

use crate::types::ExtractedFields;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_store_strip,
    r"[^A-Za-z0-9_\s\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]");
re!(re_whitespace, r"\s+");

re!(re_member_labeled,
    r"(?i)(?:会員番号|患者番号|診察券番号|登録番号|ID|No\.?)\s*[:：]?\s*([0-9A-Z\-]{4,})");
re!(re_member_id_line,
    r"(?m)^([0-9]{6,}|[0-9]{3}[-\s]?[0-9]{3}[-\s]?[0-9]{3,4}|[0-9]{4}[-\s]?[0-9]{4}|[0-9]{2}[-\s]?[0-9]{4}[-\s]?[0-9]{4})$");
re!(re_member_no, r"(?i)No\.?\s*([0-9A-Z\-]{4,})");
re!(re_member_id, r"(?i)ID\s*[:：]?\s*([0-9A-Z\-]{4,})");
re!(re_phone_shape, r"^[0-9]{2,4}-[0-9]{2,4}-[0-9]{4}$");

re!(re_phone_labeled,
    r"(?i)(?:電話|TEL|☎)\s*[:：]?\s*([0-9]{2,4}[-\s]?[0-9]{2,4}[-\s]?[0-9]{4})");
re!(re_phone_generic, r"([0-9]{2,4}[-\s]?[0-9]{2,4}[-\s]?[0-9]{4})");
re!(re_phone_mobile, r"([0-9]{3}[-\s]?[0-9]{4}[-\s]?[0-9]{4})");

re!(re_url_scheme, r"(?i)(https?://\S+)");
re!(re_url_www, r"(?i)(www\.\S+)");
re!(re_url_domain, r"(?i)([a-z0-9.-]+\.(?:com|jp|net|org|co\.jp|ne\.jp))");

re!(re_code_numeric, r"^[0-9]{8,}$");
re!(re_code_alnum, r"(?i)^[A-Z0-9]{8,}$");
re!(re_code_url, r"(?i)https?://\S+");

re!(re_postal, r"〒?\s*([0-9]{3}[-\s]?[0-9]{4})");
re!(re_postal_shape, r"^[0-9]{3}-?[0-9]{4}$");

/// Facility-type words that mark the clinic / shop name line.
const FACILITY_KEYWORDS: &[&str] = &[
    "クリニック", "病院", "医院", "歯科", "ホスピタル", "メディカル",
    "内科", "外科", "小児科", "皮膚科", "耳鼻咽喉科", "眼科",
    "整形外科", "精神科", "産婦人科", "泌尿器科", "心療内科",
    "センター", "診療所", "薬局", "ファーマシー",
];

const MIN_CODE_LEN: usize = 8;

// ── Pattern families ─────────────────────────────────────────────────────────

/// Which view of the recognized text a pattern runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// All text on one line, newlines replaced by spaces.
    Joined,
    /// Trimmed non-empty lines separated by `\n`; patterns anchor with `(?m)`.
    Lines,
}

/// One matcher strategy. Yields capture group 1, or the whole match when the
/// pattern has no group.
struct PatternFamily {
    name: &'static str,
    scope: Scope,
    regex: fn() -> &'static Regex,
}

impl PatternFamily {
    fn candidates<'t>(&self, text: &'t CardText<'_>) -> impl Iterator<Item = &'t str> + 't {
        let hay = text.haystack(self.scope);
        (self.regex)().captures_iter(hay).filter_map(|caps| {
            caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
        })
    }
}

/// Tried in order; the first acceptable candidate wins.
const MEMBER_FAMILIES: &[PatternFamily] = &[
    PatternFamily { name: "labeled", scope: Scope::Joined, regex: re_member_labeled },
    PatternFamily { name: "id_line", scope: Scope::Lines, regex: re_member_id_line },
    PatternFamily { name: "no_prefix", scope: Scope::Joined, regex: re_member_no },
    PatternFamily { name: "id_prefix", scope: Scope::Joined, regex: re_member_id },
];

const PHONE_FAMILIES: &[PatternFamily] = &[
    PatternFamily { name: "labeled", scope: Scope::Joined, regex: re_phone_labeled },
    PatternFamily { name: "generic", scope: Scope::Joined, regex: re_phone_generic },
    PatternFamily { name: "mobile", scope: Scope::Joined, regex: re_phone_mobile },
];

const URL_FAMILIES: &[PatternFamily] = &[
    PatternFamily { name: "scheme", scope: Scope::Joined, regex: re_url_scheme },
    PatternFamily { name: "www", scope: Scope::Joined, regex: re_url_www },
    PatternFamily { name: "domain", scope: Scope::Joined, regex: re_url_domain },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeKind {
    Numeric,
    Alphanumeric,
    Url,
}

const CODE_PATTERNS: &[(fn() -> &'static Regex, CodeKind)] = &[
    (re_code_numeric, CodeKind::Numeric),
    (re_code_alnum, CodeKind::Alphanumeric),
    (re_code_url, CodeKind::Url),
];

// ── Text views ───────────────────────────────────────────────────────────────

struct CardText<'a> {
    lines: Vec<&'a str>,
    joined: String,
    line_block: String,
}

impl<'a> CardText<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        Self {
            joined: text.replace('\n', " "),
            line_block: lines.join("\n"),
            lines,
        }
    }

    fn haystack(&self, scope: Scope) -> &str {
        match scope {
            Scope::Joined => &self.joined,
            Scope::Lines => &self.line_block,
        }
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct FieldExtractor;

impl FieldExtractor {
    /// Infer card fields from raw recognized text. Never fails; fields with no
    /// confident match are left as `None`.
    pub fn extract(ocr_text: &str) -> ExtractedFields {
        let text = CardText::new(ocr_text);

        let store_name = Self::extract_store_name(&text.lines);
        let member_number = Self::extract_member_number(&text);
        let phone_number = Self::extract_phone_number(&text, member_number.as_deref());
        let url = Self::extract_url(&text);
        let (barcode, qr_code) = Self::extract_codes(
            &text.lines,
            member_number.as_deref(),
            phone_number.as_deref(),
            url.is_some(),
        );

        // Detected so it is never mistaken for anything else, but not stored.
        if let Some(postal) = detect_postal_code(&text.joined) {
            tracing::trace!(%postal, "postal code detected, not persisted");
        }

        let fields = ExtractedFields {
            store_name,
            member_number,
            phone_number,
            url,
            barcode,
            qr_code,
        };
        tracing::debug!(?fields, "card fields extracted");
        fields
    }

    // ── Store name ────────────────────────────────────────────────────────────

    fn extract_store_name(lines: &[&str]) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        let mut any_keyword = false;

        for &line in lines {
            let hits = FACILITY_KEYWORDS.iter().filter(|k| line.contains(*k)).count();
            let len = line.chars().count();
            any_keyword |= hits > 0;

            let score = hits * 10 + len;
            if len > 2 && best.map_or(true, |(_, s)| score > s) {
                best = Some((line, score));
            }
        }

        let chosen = best
            .filter(|_| any_keyword)
            .map(|(line, _)| line)
            .or_else(|| lines.first().copied())?;

        let cleaned = re_store_strip().replace_all(chosen, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() { None } else { Some(cleaned.to_string()) }
    }

    // ── Member number ─────────────────────────────────────────────────────────

    fn extract_member_number(text: &CardText<'_>) -> Option<String> {
        MEMBER_FAMILIES.iter().find_map(|family| {
            let found = family
                .candidates(text)
                .map(strip_whitespace)
                .find(|c| !c.is_empty() && !re_phone_shape().is_match(c));
            if let Some(c) = &found {
                tracing::trace!(family = family.name, member = %c, "member number matched");
            }
            found
        })
    }

    // ── Phone ────────────────────────────────────────────────────────────────

    fn extract_phone_number(text: &CardText<'_>, member: Option<&str>) -> Option<String> {
        let member_digits = member.map(digits_only);
        PHONE_FAMILIES.iter().find_map(|family| {
            family
                .candidates(text)
                .map(|c| re_whitespace().replace_all(c, "-").into_owned())
                .find(|phone| member_digits.as_deref() != Some(digits_only(phone).as_str()))
        })
    }

    // ── URL ──────────────────────────────────────────────────────────────────

    fn extract_url(text: &CardText<'_>) -> Option<String> {
        let raw = URL_FAMILIES
            .iter()
            .find_map(|family| family.candidates(text).next())?;
        let has_scheme = raw.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("http"));
        let url = if has_scheme { raw.to_string() } else { format!("https://{raw}") };
        Some(url.to_lowercase())
    }

    // ── Barcode / QR ─────────────────────────────────────────────────────────

    /// Returns `(barcode, qr_code)`. A line lands in at most one of the two, and
    /// the first qualifying line per category is kept.
    fn extract_codes(
        lines: &[&str],
        member: Option<&str>,
        phone: Option<&str>,
        url_resolved: bool,
    ) -> (Option<String>, Option<String>) {
        let phone_digits = phone.map(|p| p.replace('-', ""));
        let mut barcode: Option<String> = None;
        let mut qr_code: Option<String> = None;

        for line in lines {
            let clean = strip_whitespace(line);
            if member == Some(clean.as_str()) || phone_digits.as_deref() == Some(clean.as_str()) {
                continue;
            }

            let Some(kind) = CODE_PATTERNS
                .iter()
                .find(|(re, _)| re().is_match(&clean))
                .map(|(_, kind)| *kind)
            else {
                continue;
            };

            match kind {
                // A URL already resolved as `url` is not counted twice.
                CodeKind::Url => {
                    if !url_resolved && qr_code.is_none() {
                        qr_code = re_code_url().find(&clean).map(|m| m.as_str().to_string());
                    }
                }
                CodeKind::Numeric | CodeKind::Alphanumeric => {
                    if barcode.is_none() && clean.chars().count() >= MIN_CODE_LEN {
                        barcode = Some(clean);
                    }
                }
            }
        }

        (barcode, qr_code)
    }
}

// ── Postal code ───────────────────────────────────────────────────────────────

/// Find a `〒123-4567` / `123-4567` token that is not part of a longer number such
/// as a phone number.
fn detect_postal_code(text: &str) -> Option<String> {
    let touches_number = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit() || c == '-');

    re_postal().captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let code = caps.get(1)?;
        let prefixed = whole.as_str().starts_with('〒');
        let before = text[..whole.start()].chars().next_back();
        let after = text[code.end()..].chars().next();
        if (!prefixed && touches_number(before)) || touches_number(after) {
            return None;
        }
        re_postal_shape()
            .is_match(code.as_str())
            .then(|| code.as_str().to_string())
    })
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
