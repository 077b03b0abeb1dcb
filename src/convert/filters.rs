//! Text rewrite rules applied around the external converter.
//!
//! Pandoc's Textile reader and the Redmine/OpenProject flavour of Textile
//! disagree in a number of places. Each rule below is a small pure function
//! fixing one of them; [`PRE_CONVERSION`] and [`POST_CONVERSION`] list them in
//! the order they must run. Later pre-conversion rules rely on the newline
//! structure produced by earlier ones, and blockquote wrapping has to come
//! last.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Placeholder for an inline-code delimiter pandoc would otherwise escape.
pub const TAG_CODE: &str = "pandoc-unescaped-single-backtick";

/// Class injected into `<pre>` so pandoc emits a fenced code block.
pub const TAG_FENCED_CODE_BLOCK: &str = "force-pandoc-to-ouput-fenced-code-block";

pub const BLOCKQUOTE_START: &str =
    "TextileConverterBlockquoteStart09339cab-f4f4-4739-85b0-d02ba1f342e6";
pub const BLOCKQUOTE_END: &str =
    "TextileConverterBlockquoteEnd09339cab-f4f4-4739-85b0-d02ba1f342e6";

/// A named text rewrite.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

/// Rules run on Textile before it is handed to the converter.
pub const PRE_CONVERSION: &[Rule] = &[
    Rule { name: "escape_inline_code", apply: escape_inline_code },
    Rule { name: "strip_table_spans", apply: strip_table_spans },
    Rule { name: "strip_table_alignment", apply: strip_table_alignment },
    Rule { name: "move_code_class_to_pre", apply: move_code_class_to_pre },
    Rule { name: "unwrap_code_in_pre", apply: unwrap_code_in_pre },
    Rule { name: "mark_inline_pre_fenced", apply: mark_inline_pre_fenced },
    Rule { name: "blank_line_before_pre", apply: blank_line_before_pre },
    Rule { name: "normalize_dash_numbering", apply: normalize_dash_numbering },
    Rule { name: "drop_empty_paragraphs", apply: drop_empty_paragraphs },
    Rule { name: "unnumber_headings", apply: unnumber_headings },
    Rule { name: "blank_line_before_blocks", apply: blank_line_before_blocks },
    Rule { name: "unindent_tables", apply: unindent_tables },
    Rule { name: "wrap_blockquotes", apply: wrap_blockquotes },
];

/// Rules run on the converter's Markdown output.
pub const POST_CONVERSION: &[Rule] = &[
    Rule { name: "unescape_line_markers", apply: unescape_line_markers },
    Rule { name: "blank_line_before_lists", apply: blank_line_before_lists },
    Rule { name: "strip_fenced_marker", apply: strip_fenced_marker },
    Rule { name: "restore_inline_code", apply: restore_inline_code },
    Rule { name: "unescape_wiki_links", apply: unescape_wiki_links },
    Rule { name: "underline_to_ins", apply: underline_to_ins },
    Rule { name: "unwrap_blockquotes", apply: unwrap_blockquotes },
];

/// Run `rules` over `text` in order.
pub fn apply_rules(rules: &[Rule], text: &str) -> String {
    rules
        .iter()
        .fold(text.to_string(), |current, rule| (rule.apply)(&current))
}

pub fn before_conversion(textile: &str) -> String {
    apply_rules(PRE_CONVERSION, textile)
}

pub fn after_conversion(markdown: &str) -> String {
    apply_rules(POST_CONVERSION, markdown)
}

static INLINE_CODE_AT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\S+@\S+)@").unwrap());

static TABLE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|[/\\]\d\. ").unwrap());

static TABLE_ALIGNMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|[<>=]\. ").unwrap());

static CODE_CLASS_IN_PRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<pre)(><code)( class="[^"]*")(>)"#).unwrap());

static CODE_OPEN_IN_PRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<pre[^>]*>)<code>").unwrap());

static CODE_CLOSE_IN_PRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</code>(</pre>)").unwrap());

static INLINE_PRE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n]<pre)(>)").unwrap());

static PRE_AFTER_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n])(<pre)").unwrap());

static DASH_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- {10}# (\d+)").unwrap());

static EMPTY_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\np\.\n").unwrap());

static NUMBERED_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"h(\d+)#.").unwrap());

static BLOCK_AFTER_SINGLE_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"((?:\A|\n)[^>|]+)\r?\n(\s*)(<pre>|\||>)").unwrap());

static INDENTED_TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\n)\s+(\|.+\|)\s*").unwrap());

static QUOTED_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\A|\n)(>[^\n]*(?:\n>[^\n]*)*)").unwrap());

static ESCAPED_LINE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^((?:\\[*>])+)").unwrap());

static LIST_AFTER_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([^*].*)\n\*").unwrap());

static UNDERLINE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<span class="underline">(.+)</span>"#).unwrap());

static WRAPPED_BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s){}\n(.+?)\n\n{}", BLOCKQUOTE_START, BLOCKQUOTE_END)).unwrap()
});

/// Redmine allows `@` inside `@…@` inline code (`@git@github.com@`), pandoc
/// does not. The delimiters become placeholders restored as backticks later.
pub fn escape_inline_code(text: &str) -> String {
    INLINE_CODE_AT
        .replace_all(text, |caps: &Captures| {
            format!("{TAG_CODE}{}{TAG_CODE}", &caps[1])
        })
        .into_owned()
}

/// Colspan/rowspan cells (`|\2. ` and `|/2. `) are unsupported by pandoc.
pub fn strip_table_spans(text: &str) -> String {
    TABLE_SPAN.replace_all(text, "| ").into_owned()
}

/// Cell alignment (`|<. `, `|>. `, `|=. `) is unsupported by pandoc.
pub fn strip_table_alignment(text: &str) -> String {
    TABLE_ALIGNMENT.replace_all(text, "| ").into_owned()
}

/// `<pre><code class="x">` becomes `<pre class="x"><code>` so the code block
/// keeps its language.
pub fn move_code_class_to_pre(text: &str) -> String {
    CODE_CLASS_IN_PRE
        .replace_all(text, "${1}${3}${2}${4}")
        .into_owned()
}

/// Pandoc would keep a `<code>` nested directly in `<pre>` verbatim.
pub fn unwrap_code_in_pre(text: &str) -> String {
    let opened = CODE_OPEN_IN_PRE.replace_all(text, "${1}");
    CODE_CLOSE_IN_PRE.replace_all(&opened, "${1}").into_owned()
}

/// A `<pre>` not at line start would become an indented code block followed
/// by an empty HTML comment; the marker class forces a fenced block instead.
pub fn mark_inline_pre_fenced(text: &str) -> String {
    INLINE_PRE_TAG
        .replace_all(text, |caps: &Captures| {
            format!("{} class=\"{TAG_FENCED_CODE_BLOCK}\"{}", &caps[1], &caps[2])
        })
        .into_owned()
}

/// Lists containing `<pre>` are only recognised when the `<pre>` follows a
/// blank line.
pub fn blank_line_before_pre(text: &str) -> String {
    PRE_AFTER_TEXT.replace_all(text, "${1}\n\n${2}").into_owned()
}

/// Malformed `-          # 1` numbering makes pandoc extremely slow.
pub fn normalize_dash_numbering(text: &str) -> String {
    DASH_NUMBERING.replace_all(text, "* ${1}").into_owned()
}

pub fn drop_empty_paragraphs(text: &str) -> String {
    EMPTY_PARAGRAPH.replace_all(text, "").into_owned()
}

/// Numbered headings (`h2#.`) have no CommonMark equivalent.
pub fn unnumber_headings(text: &str) -> String {
    NUMBERED_HEADING.replace_all(text, "h${1}.").into_owned()
}

/// Code blocks, tables and blockquotes after a single newline do not
/// interrupt the preceding paragraph; make that newline a blank line.
pub fn blank_line_before_blocks(text: &str) -> String {
    BLOCK_AFTER_SINGLE_NEWLINE
        .replace_all(text, "${1}\n\n${2}${3}")
        .into_owned()
}

/// Indented table rows are not recognised as tables.
pub fn unindent_tables(text: &str) -> String {
    INDENTED_TABLE_ROW
        .replace_all(text, "\n\n${2}\n")
        .into_owned()
}

/// `>` is not a Textile blockquote and pandoc would escape it. Quoted runs are
/// stripped of their markers and fenced by boundary lines so
/// [`unwrap_blockquotes`] can rebuild them after conversion.
pub fn wrap_blockquotes(text: &str) -> String {
    QUOTED_LINES
        .replace_all(text, |caps: &Captures| {
            let lines: Vec<&str> = caps[1]
                .split('\n')
                .map(|line| {
                    line.strip_prefix('>')
                        .unwrap_or(line)
                        .trim_start_matches(' ')
                })
                .collect();
            format!(
                "\n{BLOCKQUOTE_START}\n\n{}\n\n{BLOCKQUOTE_END}\n",
                lines.join("\n")
            )
        })
        .into_owned()
}

/// Pandoc escapes `*` and `>` at line start.
pub fn unescape_line_markers(text: &str) -> String {
    ESCAPED_LINE_MARKERS
        .replace_all(text, |caps: &Captures| caps[1].replace('\\', ""))
        .into_owned()
}

pub fn blank_line_before_lists(text: &str) -> String {
    LIST_AFTER_TEXT.replace_all(text, "${1}\n\n*").into_owned()
}

pub fn strip_fenced_marker(text: &str) -> String {
    text.replace(&format!(" {TAG_FENCED_CODE_BLOCK}"), "")
}

pub fn restore_inline_code(text: &str) -> String {
    text.replace(TAG_CODE, "`")
}

/// Wiki links (`[[Page]]`) must stay unescaped.
pub fn unescape_wiki_links(text: &str) -> String {
    text.replace(r"\[\[", "[[").replace(r"\]\]", "]]")
}

/// `+underline+` comes back as a span; GFM renders `<ins>`.
pub fn underline_to_ins(text: &str) -> String {
    UNDERLINE_SPAN
        .replace_all(text, "<ins>${1}</ins>")
        .into_owned()
}

pub fn unwrap_blockquotes(text: &str) -> String {
    WRAPPED_BLOCKQUOTE
        .replace_all(text, |caps: &Captures| {
            let mut lines = caps[1].split('\n');
            let mut quoted = lines.next().unwrap_or_default().to_string();
            for line in lines {
                quoted.push_str("\n> ");
                quoted.push_str(line);
            }
            quoted
        })
        .into_owned()
}
