use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::todo::{Category, Todo, TodoId};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour needs both `color` switched on and a terminal on stdout.
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: color_wanted(cfg) && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Header with the active category highlighted, followed by its to-dos.
    #[tracing::instrument(skip(self, out, todos))]
    pub fn write_board<W: Write>(
        &self,
        mut out: W,
        active: Category,
        todos: &[(TodoId, &Todo)],
    ) -> anyhow::Result<()> {
        let tabs = [Category::Work, Category::Travel]
            .into_iter()
            .map(|category| {
                if category == active {
                    self.paint(&format!("[{}]", category.label()), "1")
                } else {
                    self.paint(&format!(" {} ", category.label()), "90")
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{}", tabs.trim_end())?;
        writeln!(out)?;

        if todos.is_empty() {
            writeln!(out, "{}", self.paint(active.placeholder(), "90"))?;
            return Ok(());
        }

        self.write_todo_table(out, todos)
    }

    pub fn write_todo_table<W: Write>(
        &self,
        out: W,
        todos: &[(TodoId, &Todo)],
    ) -> anyhow::Result<()> {
        let rows: Vec<[String; 3]> = todos
            .iter()
            .map(|(id, todo)| {
                let mark = if todo.done { "[x]" } else { "[ ]" };
                let text = if todo.done {
                    self.paint(&todo.text, "9")
                } else {
                    todo.text.clone()
                };
                [self.paint(&id.to_string(), "33"), mark.to_string(), text]
            })
            .collect();

        write_columns(out, ["ID", "Done", "Text"], &rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn color_wanted(cfg: &Config) -> bool {
    cfg.get_bool("color").unwrap_or(true)
}

/// Left-aligned columns separated by one space, with a dashed rule under the
/// header. Trailing padding is trimmed.
fn write_columns<W: Write, const N: usize>(
    mut writer: W,
    headers: [&str; N],
    rows: &[[String; N]],
) -> anyhow::Result<()> {
    let mut widths = headers.map(|h| UnicodeWidthStr::width(h));
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let rule = widths.map(|w| "-".repeat(w));
    write_row(&mut writer, &widths, &headers)?;
    write_row(&mut writer, &widths, &rule)?;
    for row in rows {
        write_row(&mut writer, &widths, row)?;
    }
    Ok(())
}

fn write_row<W: Write, S: AsRef<str>>(
    writer: &mut W,
    widths: &[usize],
    cells: &[S],
) -> anyhow::Result<()> {
    let mut line = String::new();
    for (cell, width) in cells.iter().zip(widths) {
        let cell = cell.as_ref();
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(visible_width(cell)) + 1));
    }
    writeln!(writer, "{}", line.trim_end())?;
    Ok(())
}

/// Display width of `s` ignoring `ESC[...m` colour sequences.
fn visible_width(s: &str) -> usize {
    s.split('\x1b')
        .enumerate()
        .map(|(idx, chunk)| {
            let text = if idx == 0 {
                chunk
            } else {
                chunk.split_once('m').map_or("", |(_, rest)| rest)
            };
            UnicodeWidthStr::width(text)
        })
        .sum()
}
