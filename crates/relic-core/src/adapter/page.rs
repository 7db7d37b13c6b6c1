//! Embedded-page extraction: markup mixing C# or VB server code.
//!
//! The page adapter owns no grammar of its own. It decides which managed
//! language the page embeds, masks everything outside the code regions with
//! blanks (preserving line breaks exactly, so the delegate's line numbers
//! stay valid against the original file), and re-dispatches to the matching
//! adapter. The parse result is tagged with the chosen delegate and any
//! synthetic-line correction, so later scan calls route transparently.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::adapter::{
    AdapterError, CSharpAdapter, PageDelegate, ParseOutput, SizeLimits, SourceAdapter, VbAdapter,
};
use crate::model::{Definition, Reference};

/// `<%@ Page Language="C#" %>` / `<%@ Language="VBScript" %>`
static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<%@[^>]*?language\s*=\s*"?([A-Za-z#]+)"?"#)
        .expect("directive pattern is valid")
});

/// `<script runat="server"> ... </script>`
static SERVER_SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script\s[^>]*runat\s*=\s*["']server["'][^>]*>(.*?)</script>"#)
        .expect("server script pattern is valid")
});

/// Synthetic container the VB delegate needs around bare page script.
const VB_WRAPPER_HEADER: &str = "Module PageWrapper\n";
const VB_WRAPPER_FOOTER: &str = "\nEnd Module";

/// Composite adapter for page templates (.asp, .aspx, .cshtml, .razor).
pub struct PageAdapter {
    csharp: CSharpAdapter,
    vb: VbAdapter,
}

impl PageAdapter {
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            csharp: CSharpAdapter::new(limits),
            vb: VbAdapter::new(),
        }
    }

    fn delegate_adapter(&self, delegate: PageDelegate) -> &dyn SourceAdapter {
        match delegate {
            PageDelegate::CSharp => &self.csharp,
            PageDelegate::Vb => &self.vb,
        }
    }

    /// Pick the embedded language: the extension default, overridden by an
    /// explicit in-document directive.
    fn detect_language(source: &str, path: Option<&Path>) -> PageDelegate {
        let mut delegate = match path.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
            // Legacy ASP defaults to VBScript.
            Some(ext) if ext.eq_ignore_ascii_case("asp") => PageDelegate::Vb,
            _ => PageDelegate::CSharp,
        };

        if let Some(caps) = DIRECTIVE_RE.captures(source) {
            let lang = caps[1].to_lowercase();
            if lang.contains("vb") {
                delegate = PageDelegate::Vb;
            } else if lang.contains("c#") || lang.contains("csharp") {
                delegate = PageDelegate::CSharp;
            }
        }

        delegate
    }

    /// Replace every character outside recognized code regions with a
    /// blank, preserving line breaks exactly.
    ///
    /// Code regions are `<% ... %>` expression/statement blocks (directives
    /// `<%@ ... %>` excluded) and `<script runat="server">` bodies.
    fn mask_markup(source: &str) -> String {
        let mut keep = vec![false; source.len()];

        // <% ... %> blocks. Scanned by hand: the directive exclusion would
        // need lookahead the regex engine does not have.
        let mut i = 0;
        while let Some(found) = source[i..].find("<%") {
            let open = i + found;
            let after = open + 2;
            let rest = &source[after..];

            if rest.starts_with('@') {
                // Directive: masked out entirely.
                match rest.find("%>") {
                    Some(close) => {
                        i = after + close + 2;
                        continue;
                    }
                    None => break,
                }
            }

            let content_start = if rest.starts_with('=') { after + 1 } else { after };
            match source[content_start..].find("%>") {
                Some(close) => {
                    let content_end = content_start + close;
                    keep[content_start..content_end].fill(true);
                    i = content_end + 2;
                }
                None => {
                    // Unterminated block: keep the tail, it is still code.
                    keep[content_start..].fill(true);
                    break;
                }
            }
        }

        for caps in SERVER_SCRIPT_RE.captures_iter(source) {
            if let Some(body) = caps.get(1) {
                keep[body.start()..body.end()].fill(true);
            }
        }

        let mut masked = String::with_capacity(source.len());
        for (idx, ch) in source.char_indices() {
            if keep[idx] || ch == '\n' || ch == '\r' {
                masked.push(ch);
            } else {
                masked.push(' ');
            }
        }
        masked
    }
}

impl SourceAdapter for PageAdapter {
    fn init(&mut self) -> Result<(), AdapterError> {
        self.csharp.init()?;
        self.vb.init()?;
        Ok(())
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> ParseOutput {
        let delegate = Self::detect_language(source, path);
        let masked = Self::mask_markup(source);

        let (inner, line_shift) = match delegate {
            PageDelegate::CSharp => (self.csharp.parse(&masked, None), 0),
            PageDelegate::Vb => {
                // The VB delegate needs a syntactic container around bare
                // top-level page script; the wrapper adds one line before
                // the content, corrected below on every emitted line.
                let wrapped = format!("{VB_WRAPPER_HEADER}{masked}{VB_WRAPPER_FOOTER}");
                (self.vb.parse(&wrapped, None), -1)
            }
        };

        ParseOutput::Page {
            inner: Box::new(inner),
            delegate,
            line_shift,
        }
    }

    fn scan_definitions(&self, parsed: &ParseOutput) -> Vec<Definition> {
        let ParseOutput::Page {
            inner,
            delegate,
            line_shift,
        } = parsed
        else {
            return Vec::new();
        };

        let mut definitions = self.delegate_adapter(*delegate).scan_definitions(inner);
        if *line_shift != 0 {
            for def in &mut definitions {
                def.shift_lines(*line_shift);
            }
        }
        // The wrapper module is scaffolding, not a page symbol.
        definitions.retain(|d| d.name != "PageWrapper");
        definitions
    }

    fn scan_references(&self, parsed: &ParseOutput, globals: &HashSet<String>) -> Vec<Reference> {
        let ParseOutput::Page {
            inner, delegate, ..
        } = parsed
        else {
            return Vec::new();
        };
        self.delegate_adapter(*delegate).scan_references(inner, globals)
    }
}
