//! Terminal rendering surface for the visualization driver.
//!
//! Spectral frames are drawn as a braille point cloud: every active mesh
//! vertex is projected obliquely so that older history rows recede up and to
//! the right. Waveform frames are drawn as a continuous line across the full
//! width. A one-line footer shows mode, driver state and source transport.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Paragraph,
    },
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::driver::{DriverState, FramePayload, VisualizationMode};
use super::visualizations::waveform::interpolate;
use super::visualizations::MeshExtents;

/// Horizontal and vertical shift per unit of depth.
const DEPTH_SLANT: f32 = 0.4;

/// Line segments used to draw one waveform frame.
const WAVEFORM_SEGMENTS: usize = 256;

const FOREGROUND: Color = Color::Rgb(206, 224, 220);
const FOREGROUND_DIM: Color = Color::Rgb(110, 128, 132);
const BACKGROUND: Color = Color::Rgb(0, 0, 0);

/// User input command for the visualization loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerCommand {
    /// No key, or a key without a binding
    Continue,
    /// Leave the visualizer (Escape, 'q' or Ctrl+C)
    Quit,
    /// Pause/resume the audio source (Space)
    TogglePause,
    /// Start/stop the driver ('s')
    ToggleRunning,
    /// Cycle to the next mode ('m')
    NextMode,
    /// Jump to a mode ('1'..'5')
    SelectMode(VisualizationMode),
}

/// Maps a key press to the command it triggers.
pub fn command_for_key(key: KeyEvent) -> VisualizerCommand {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => VisualizerCommand::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            VisualizerCommand::Quit
        }
        KeyCode::Char(' ') => VisualizerCommand::TogglePause,
        KeyCode::Char('s') => VisualizerCommand::ToggleRunning,
        KeyCode::Char('m') => VisualizerCommand::NextMode,
        KeyCode::Char(digit @ '1'..='5') => {
            let index = digit as usize - '1' as usize;
            VisualizerCommand::SelectMode(VisualizationMode::ALL[index])
        }
        _ => VisualizerCommand::Continue,
    }
}

/// Source description shown in the footer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatus {
    /// Device or file name
    pub label: String,
    pub paused: bool,
    /// `(position, duration)` in seconds for file playback
    pub progress: Option<(f32, f32)>,
    pub finished: bool,
}

/// Oblique projection of a mesh vertex onto the canvas plane.
pub fn project_vertex(x: f32, height: f32, z: f32, extents: &MeshExtents) -> (f64, f64) {
    let depth = z + extents.z_depth / 2.0;
    (
        f64::from(x + depth * DEPTH_SLANT),
        f64::from(height + depth * DEPTH_SLANT),
    )
}

/// Canvas y for a waveform amplitude, with 0 at the bottom edge and 1 at the top.
pub fn waveform_y(amplitude: f32) -> f64 {
    let from_top = 0.5 - amplitude / 2.5;
    f64::from(1.0 - from_top).clamp(0.0, 1.0)
}

/// Terminal UI that draws driver payloads.
pub struct VisualizerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    extents: MeshExtents,
    /// Projected points, newer half and older half of the history
    front_points: Vec<(f64, f64)>,
    back_points: Vec<(f64, f64)>,
    active: bool,
}

impl VisualizerTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new(extents: MeshExtents, vertex_count: usize) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            extents,
            front_points: Vec::with_capacity(vertex_count),
            back_points: Vec::with_capacity(vertex_count),
            active: true,
        })
    }

    /// Draws one frame. A `None` payload leaves the drawing area blank.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(
        &mut self,
        payload: Option<FramePayload<'_>>,
        mode: VisualizationMode,
        state: DriverState,
        source: &SourceStatus,
    ) -> Result<()> {
        let extents = self.extents;
        let mut waveform: Option<&[f32]> = None;

        self.front_points.clear();
        self.back_points.clear();
        match payload {
            Some(FramePayload::Heights { heights, layout }) => {
                let split = layout.x_res() * layout.z_res().div_ceil(2);
                for (index, (position, height)) in
                    layout.positions().iter().zip(heights).enumerate()
                {
                    if !layout.is_vertex_active(index) {
                        continue;
                    }
                    let point = project_vertex(position[0], *height, position[1], &extents);
                    if index < split {
                        self.front_points.push(point);
                    } else {
                        self.back_points.push(point);
                    }
                }
            }
            Some(FramePayload::Amplitudes(samples)) => waveform = Some(samples),
            None => {}
        }

        let slant = extents.z_depth * DEPTH_SLANT;
        let mesh_x = [
            f64::from(-extents.x_width / 2.0),
            f64::from(extents.x_width / 2.0 + slant),
        ];
        let mesh_y = [0.0, f64::from(extents.y_height + slant)];

        let front_points = &self.front_points;
        let back_points = &self.back_points;

        self.terminal.draw(|frame| {
            let area = frame.area();
            let footer_height = 1;

            let content_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(footer_height),
            };

            match waveform {
                Some(samples) => {
                    let canvas = Canvas::default()
                        .background_color(BACKGROUND)
                        .marker(Marker::Braille)
                        .x_bounds([0.0, 1.0])
                        .y_bounds([0.0, 1.0])
                        .paint(|ctx| {
                            let mut previous = (0.0, waveform_y(interpolate(samples, 0.0, 1.0)));
                            for step in 1..=WAVEFORM_SEGMENTS {
                                let x = step as f32 / WAVEFORM_SEGMENTS as f32;
                                let next = (f64::from(x), waveform_y(interpolate(samples, x, 1.0)));
                                ctx.draw(&CanvasLine {
                                    x1: previous.0,
                                    y1: previous.1,
                                    x2: next.0,
                                    y2: next.1,
                                    color: FOREGROUND,
                                });
                                previous = next;
                            }
                        });
                    frame.render_widget(canvas, content_area);
                }
                None => {
                    let canvas = Canvas::default()
                        .background_color(BACKGROUND)
                        .marker(Marker::Braille)
                        .x_bounds(mesh_x).y_bounds(mesh_y).paint(|ctx| {
                        ctx.draw(&Points {
                            coords: back_points,
                            color: FOREGROUND_DIM,
                        });
                        ctx.draw(&Points {
                            coords: front_points,
                            color: FOREGROUND,
                        });
                    });
                    frame.render_widget(canvas, content_area);
                }
            }

            let footer_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(footer_height),
                width: area.width,
                height: footer_height,
            };
            let footer = Paragraph::new(footer_line(mode, state, source)).style(
                Style::default()
                    .fg(Color::Rgb(185, 207, 212))
                    .bg(BACKGROUND),
            );
            frame.render_widget(footer, footer_area);
        })?;

        Ok(())
    }

    /// Polls for a key press for at most `timeout`.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> Result<VisualizerCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(VisualizerCommand::Continue);
                }
                let command = command_for_key(key);
                if command != VisualizerCommand::Continue {
                    tracing::debug!("Key {:?}: {:?}", key.code, command);
                }
                return Ok(command);
            }
        }
        Ok(VisualizerCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for VisualizerTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn footer_line(
    mode: VisualizationMode,
    state: DriverState,
    source: &SourceStatus,
) -> ratatui::text::Line<'static> {
    let indicator = if source.paused {
        Span::styled("⏸ ", Style::default().fg(Color::Yellow))
    } else if source.finished {
        Span::styled("■ ", Style::default().fg(FOREGROUND_DIM))
    } else {
        Span::styled("● ", Style::default().fg(Color::Red))
    };

    let state_span = match state {
        DriverState::Running => Span::raw("running"),
        DriverState::Stopped => Span::styled("stopped", Style::default().fg(Color::Yellow)),
    };

    let mut spans = vec![
        indicator,
        Span::raw(mode.to_string()),
        Span::raw(" / "),
        state_span,
        Span::raw(" / "),
        Span::raw(source.label.clone()),
    ];
    if let Some((position, duration)) = source.progress {
        spans.push(Span::raw(format!(
            " {} / {}",
            format_time(position),
            format_time(duration)
        )));
    }
    spans.push(Span::styled(
        "   space pause · s start/stop · m mode · q quit",
        Style::default().fg(FOREGROUND_DIM),
    ));

    ratatui::text::Line::from(spans)
}

fn format_time(secs: f32) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
