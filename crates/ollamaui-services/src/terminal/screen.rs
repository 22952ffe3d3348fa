use std::collections::VecDeque;

/// Colour a line is drawn in, taken from the SGR codes written into it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Normal,
    Red,
    Green,
    Yellow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenLine {
    chars: Vec<char>,
    pub tone: Tone,
}

impl ScreenLine {
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Escape {
    None,
    Start,
    Csi(String),
}

/// Minimal emulated screen: enough of a VT100 to show command output,
/// the shell prompt and carriage-return progress lines.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    lines: VecDeque<ScreenLine>,
    scrollback: usize,
    column: usize,
    /// Set by `\r`; the next printable character starts the line afresh
    rewrite: bool,
    tone: Tone,
    escape: Escape,
}

impl ScreenBuffer {
    pub fn new(scrollback: usize) -> Self {
        Self {
            lines: VecDeque::from([ScreenLine::default()]),
            scrollback: scrollback.max(1),
            column: 0,
            rewrite: false,
            tone: Tone::Normal,
            escape: Escape::None,
        }
    }

    pub fn write(&mut self, text: &str) {
        for c in text.chars() {
            self.feed(c);
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &ScreenLine> {
        self.lines.iter()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line the cursor is on
    pub fn current_line(&self) -> &ScreenLine {
        // Never empty: construction and `clear` always leave one line
        &self.lines[self.lines.len() - 1]
    }

    /// All lines joined with `\n`, trailing spaces removed
    pub fn contents(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.lines = VecDeque::from([ScreenLine::default()]);
        self.column = 0;
        self.rewrite = false;
    }

    fn feed(&mut self, c: char) {
        match std::mem::replace(&mut self.escape, Escape::None) {
            Escape::Start => {
                if c == '[' {
                    self.escape = Escape::Csi(String::new());
                }
                return;
            }
            Escape::Csi(mut params) => {
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    self.finish_csi(&params, c);
                } else {
                    params.push(c);
                    self.escape = Escape::Csi(params);
                }
                return;
            }
            Escape::None => {}
        }

        match c {
            '\x1b' => self.escape = Escape::Start,
            '\n' => self.newline(),
            '\r' => {
                self.column = 0;
                self.rewrite = true;
            }
            '\x08' => self.column = self.column.saturating_sub(1),
            '\t' => self.put(c),
            c if c.is_control() => {}
            c => self.put(c),
        }
    }

    fn finish_csi(&mut self, params: &str, command: char) {
        match command {
            'm' => {
                for code in params.split(';') {
                    self.tone = match code {
                        "" | "0" | "39" => Tone::Normal,
                        "31" => Tone::Red,
                        "32" => Tone::Green,
                        "33" => Tone::Yellow,
                        _ => self.tone,
                    };
                }
            }
            // Erase to end of line
            'K' => {
                let column = self.column;
                self.line_mut().chars.truncate(column);
            }
            _ => {}
        }
    }

    fn line_mut(&mut self) -> &mut ScreenLine {
        if self.lines.is_empty() {
            self.lines.push_back(ScreenLine::default());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn put(&mut self, c: char) {
        let rewrite = std::mem::take(&mut self.rewrite);
        let tone = self.tone;
        let column = self.column;
        let line = self.line_mut();
        if rewrite {
            line.chars.clear();
            line.tone = Tone::Normal;
        }
        if tone != Tone::Normal {
            line.tone = tone;
        }
        if column < line.chars.len() {
            line.chars[column] = c;
        } else {
            line.chars.resize(column, ' ');
            line.chars.push(c);
        }
        self.column += 1;
    }

    fn newline(&mut self) {
        self.lines.push_back(ScreenLine::default());
        while self.lines.len() > self.scrollback {
            self.lines.pop_front();
        }
        self.column = 0;
        self.rewrite = false;
    }
}

impl Default for ScreenBuffer {
    fn default() -> Self {
        Self::new(2000)
    }
}
