//! UI rendering for the stepper.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::{Catalogue, ExecutionPhase, Phase};
use super::app::StepperApp;

/// Memory cells shown per row.
const CELLS_PER_ROW: usize = 8;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &StepperApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(65),
        ])
        .split(frame.area());

    // Left side: catalogue
    draw_catalogue(frame, chunks[0], app);

    // Right side: steps, state, status and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_steps(frame, right_chunks[0], app);
    draw_registers(frame, right_chunks[1], app);
    draw_memory(frame, right_chunks[2], app);
    draw_status(frame, right_chunks[3], app);
    draw_help(frame, right_chunks[4]);
}

/// Draw the instruction catalogue with the selection highlighted.
fn draw_catalogue(frame: &mut Frame, area: Rect, app: &StepperApp) {
    let loaded = app.cpu.instruction().map(|i| i.id);

    let items: Vec<ListItem> = Catalogue::builtin()
        .iter()
        .enumerate()
        .map(|(index, instr)| {
            let prefix = if index == app.selected { "▶ " } else { "  " };
            let marker = if Some(instr.id) == loaded { "●" } else { " " };

            let style = if index == app.selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if Some(instr.id) == loaded {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };

            ListItem::new(format!("{}{} {:<14} {}", prefix, marker, instr.mnemonic, instr.kind))
                .style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Instructions ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the step list with applied steps dimmed and the next one marked.
fn draw_steps(frame: &mut Frame, area: Rect, app: &StepperApp) {
    let cursor = app.cpu.cursor();

    let items: Vec<ListItem> = app.cpu
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let (prefix, style) = if index + 1 == cursor {
                ("▶ ", phase_style(step.phase).add_modifier(Modifier::BOLD))
            } else if index < cursor {
                ("✓ ", Style::default().fg(Color::DarkGray))
            } else {
                ("  ", Style::default())
            };
            ListItem::new(format!("{}{:<9} {}", prefix, step.phase, step.description)).style(style)
        })
        .collect();

    let title = match app.cpu.instruction() {
        Some(instr) => format!(" Steps: {} [{}] ", instr.mnemonic, app.cpu.phase()),
        None => " Steps ".to_string(),
    };

    let list = List::new(items)
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw register state, highlighting registers the last step wrote.
fn draw_registers(frame: &mut Frame, area: Rect, app: &StepperApp) {
    let changed = app.changed_registers();
    let regs = app.cpu.registers();

    let spans = |range: std::ops::Range<usize>| -> Line<'static> {
        let mut spans = Vec::new();
        for (reg, value) in regs.iter().skip(range.start).take(range.len()) {
            let style = if changed.contains(&reg) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::raw(format!("{:>5}: ", reg.name())));
            spans.push(Span::styled(format!("{:<8}", value), style));
        }
        Line::from(spans)
    };

    let content = vec![
        spans(0..4),
        spans(4..7),
        Line::from(vec![
            Span::raw("Phase: "),
            Span::styled(
                format!("{}", app.cpu.phase()),
                if app.cpu.phase() == ExecutionPhase::Idle {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::Green)
                },
            ),
            Span::raw("   Completed: "),
            Span::styled(format!("{}", app.cpu.completed), Style::default().fg(Color::Cyan)),
            Span::raw(format!("   Speed: {}x", app.config.speed)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory as rows of cells, highlighting the last writes.
fn draw_memory(frame: &mut Frame, area: Rect, app: &StepperApp) {
    let changed = app.changed_addresses();
    let mem = app.cpu.memory();
    let visible_rows = area.height.saturating_sub(2) as usize;
    let total_rows = mem.len().div_ceil(CELLS_PER_ROW);
    let first_row = app.mem_scroll.min(total_rows.saturating_sub(1));

    let lines: Vec<Line> = (first_row..total_rows)
        .take(visible_rows)
        .map(|row| {
            let base = row * CELLS_PER_ROW;
            let mut spans = vec![Span::styled(
                format!("{:04x}: ", base),
                Style::default().fg(Color::DarkGray),
            )];
            for (addr, value) in mem.dump(base, CELLS_PER_ROW) {
                let style = if changed.contains(&(addr as i64)) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:>6} ", value), style));
            }
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default()
            .title(format!(" Memory ({} cells) ", mem.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &StepperApp) {
    let style = if app.status.starts_with("Error") {
        Style::default().fg(Color::Red)
    } else if app.playing {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    };

    let paragraph = Paragraph::new(app.status.as_str())
        .style(style)
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = vec![
        Line::from("↑/↓: select  Enter: load  n: step  space: play/pause  b: rewind"),
        Line::from("+/-: speed  r: reset  PgUp/PgDn: scroll memory  q: quit"),
    ];

    let paragraph = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default()
            .title(" Help ")
            .borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}

/// Color for a phase.
fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::Fetch => Style::default().fg(Color::Cyan),
        Phase::Decode => Style::default().fg(Color::Blue),
        Phase::Execute => Style::default().fg(Color::Yellow),
        Phase::Memory => Style::default().fg(Color::Magenta),
        Phase::Writeback => Style::default().fg(Color::Green),
    }
}
