use std::io::{self, Write};

use crossterm::{
    cursor::MoveToColumn,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
    QueueableCommand,
};
use typewriter_core::{ElementSpec, MemoryBackend, MemoryNodeKind, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
}

impl TextStyle {
    fn nested(mut self, element: &ElementSpec, cursor_class: &str, blink_cursor: bool) -> Self {
        match element.tag.as_str() {
            "b" | "strong" => self.bold = true,
            "i" | "em" => self.italic = true,
            "u" | "ins" => self.underline = true,
            _ => {}
        }
        if blink_cursor && element.has_class(cursor_class) {
            self.blink = true;
        }
        self
    }

    fn attributes(&self) -> impl Iterator<Item = Attribute> {
        [
            (self.bold, Attribute::Bold),
            (self.italic, Attribute::Italic),
            (self.underline, Attribute::Underlined),
            (self.blink, Attribute::SlowBlink),
        ]
        .into_iter()
        .filter_map(|(on, attribute)| on.then_some(attribute))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: TextStyle,
}

/// Flattens the render tree under `root` into styled runs of text.
/// Adjacent runs sharing a style are merged.
pub fn segments(backend: &MemoryBackend, root: NodeId, cursor_class: &str) -> Vec<Segment> {
    let blink_cursor = !backend.injected_styles().is_empty();
    let mut out = Vec::new();
    collect(backend, root, TextStyle::default(), cursor_class, blink_cursor, &mut out);
    out
}

fn collect(
    backend: &MemoryBackend,
    id: NodeId,
    style: TextStyle,
    cursor_class: &str,
    blink_cursor: bool,
    out: &mut Vec<Segment>,
) {
    match backend.kind(id) {
        Some(MemoryNodeKind::Text(text)) => {
            // Single line output.
            let text = text.replace(['\n', '\r'], " ");
            match out.last_mut() {
                Some(last) if last.style == style => last.text.push_str(&text),
                _ => out.push(Segment { text, style }),
            }
        }
        Some(MemoryNodeKind::Element(element)) => {
            let style = style.nested(element, cursor_class, blink_cursor);
            for &child in backend.children(id) {
                collect(backend, child, style, cursor_class, blink_cursor, out);
            }
        }
        None => {}
    }
}

/// Repaints the current terminal line with the container's contents.
pub struct Painter<W: Write> {
    out: W,
    cursor_class: String,
}

impl<W: Write> Painter<W> {
    pub fn new(out: W, cursor_class: impl Into<String>) -> Self {
        Self {
            out,
            cursor_class: cursor_class.into(),
        }
    }

    pub fn paint(&mut self, backend: &MemoryBackend, root: NodeId) -> io::Result<()> {
        self.out
            .queue(MoveToColumn(0))?
            .queue(Clear(ClearType::CurrentLine))?;

        for segment in segments(backend, root, &self.cursor_class) {
            for attribute in segment.style.attributes() {
                self.out.queue(SetAttribute(attribute))?;
            }
            self.out
                .queue(Print(segment.text))?
                .queue(SetAttribute(Attribute::Reset))?;
        }

        self.out.flush()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
