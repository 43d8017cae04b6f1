//! Rendering - header, GPU table and footer

use chrono::Local;
use gpuwatch_common::render::{DisplayRow, Tone, COLUMNS};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Dim => Style::default().add_modifier(Modifier::DIM),
        Tone::Pending => Style::default().fg(Color::Yellow),
        Tone::Good => Style::default().fg(Color::Green),
        Tone::Bad => Style::default().fg(Color::Red),
    }
}

fn table_row(row: &DisplayRow) -> Row<'_> {
    let value_style = if row.faulted {
        tone_style(Tone::Bad)
    } else {
        Style::default()
    };
    let status = match &row.status {
        Some(label) => Cell::from(label.text.as_str()).style(tone_style(label.tone)),
        None => Cell::from(""),
    };
    Row::new(vec![
        Cell::from(row.host.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(row.gpu.as_str()),
        Cell::from(row.utilization.as_str()).style(value_style),
        Cell::from(row.memory.as_str()).style(value_style),
        status,
    ])
}

/// Draw the whole dashboard for one frame.
pub fn draw_dashboard(f: &mut Frame, rows: &[DisplayRow], host_count: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.size());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" gpuwatch", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            " | {} host{} | {}",
            host_count,
            if host_count == 1 { "" } else { "s" },
            Local::now().format("%H:%M:%S")
        )),
    ]));
    f.render_widget(header, chunks[0]);

    let widths = [
        Constraint::Length(16),
        Constraint::Length(4),
        Constraint::Length(5),
        Constraint::Length(16),
        Constraint::Min(10),
    ];
    let table = Table::new(rows.iter().map(table_row), widths)
        .header(
            Row::new(COLUMNS.iter().map(|c| Cell::from(*c)))
                .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
        )
        .block(Block::default().borders(Borders::ALL))
        .column_spacing(2);
    f.render_widget(table, chunks[1]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" q", Style::default().fg(Color::Cyan)),
        Span::raw(" quit  "),
        Span::styled("r", Style::default().fg(Color::Cyan)),
        Span::raw(" redraw"),
    ]));
    f.render_widget(footer, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuwatch_common::render::StatusLabel;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_dashboard_draws_rows() {
        let rows = vec![
            DisplayRow {
                host: "gpu-a".to_string(),
                gpu: "0".to_string(),
                utilization: "45%".to_string(),
                memory: " 2.0 /  8.0 GiB".to_string(),
                faulted: false,
                status: Some(StatusLabel {
                    text: "3s ago".to_string(),
                    tone: Tone::Good,
                }),
            },
            DisplayRow {
                host: String::new(),
                gpu: "1".to_string(),
                utilization: "ERR".to_string(),
                memory: "ERR".to_string(),
                faulted: true,
                status: None,
            },
        ];

        let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
        terminal.draw(|f| draw_dashboard(f, &rows, 1)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("gpuwatch"));
        assert!(text.contains("1 host |"));
        assert!(text.contains("Server"));
        assert!(text.contains("gpu-a"));
        assert!(text.contains("3s ago"));
        assert!(text.contains("ERR"));
    }

    #[test]
    fn test_dashboard_survives_tiny_terminal() {
        let mut terminal = Terminal::new(TestBackend::new(10, 3)).unwrap();
        terminal.draw(|f| draw_dashboard(f, &[], 0)).unwrap();
    }
}
