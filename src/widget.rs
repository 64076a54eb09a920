use crate::camera::{CameraController, DragMode};
use crate::config::Config;
use crate::graphics::{Canvas, Rgb, Surface};
use crate::labels::{LabelAnchor, VISIBILITY_MARGIN};
use crate::physics::PhysicsEngine;
use crate::scene::{blade_color, BACKGROUND};
use crate::simulation::{FrameOutput, SimulationLoop, Telemetry};
use crate::state::AppState;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, BeginSynchronizedUpdate, ClearType, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
    EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const WIND_STEP: f64 = 0.5;
const TORQUE_STEP: f64 = 5.0;
const LENGTH_STEP: f64 = 20.0;
/// Orbit applied per arrow key press, in pointer pixels
const ARROW_ORBIT: f64 = 8.0;
const TEXT: Rgb = Rgb(230, 230, 235);
const DIM: Rgb = Rgb(140, 145, 160);
const LEADER: Rgb = Rgb(200, 200, 210);
const ALERT: Rgb = Rgb(240, 80, 70);
const HELP: &str =
    "w/W wind  t/T torque  a autopilot  b/B blades  o/O outer  i/I inner  p pause  l labels  r camera  q quit";

/// One terminal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Rgb,
    pub bg: Rgb,
}

impl Cell {
    fn blank(bg: Rgb) -> Self {
        Cell { ch: ' ', fg: bg, bg }
    }
}

/// Grid of terminal cells
#[derive(Debug, Clone, PartialEq)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        CellBuffer {
            width,
            height,
            cells: vec![Cell::blank(Rgb::BLACK); width as usize * height as usize],
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.width && y < self.height).then(|| self.cells[y as usize * self.width as usize + x as usize])
    }

    /// Packs two canvas rows into each cell with an upper half block
    pub fn fill_from_canvas(&mut self, canvas: &Canvas) {
        for y in 0..self.height {
            for x in 0..self.width {
                let upper = canvas.pixel(x as usize, y as usize * 2).unwrap_or(BACKGROUND);
                let lower = canvas.pixel(x as usize, y as usize * 2 + 1).unwrap_or(BACKGROUND);
                self.cells[y as usize * self.width as usize + x as usize] = Cell {
                    ch: '▀',
                    fg: upper,
                    bg: lower,
                };
            }
        }
    }

    /// Writes text over the picture, keeping each cell's lower pixel as background
    pub fn write_str(&mut self, x: i32, y: i32, text: &str, fg: Rgb) {
        if y < 0 || y >= self.height as i32 {
            return;
        }
        for (i, ch) in text.chars().enumerate() {
            let cx = x + i as i32;
            if cx < 0 {
                continue;
            }
            if cx >= self.width as i32 {
                break;
            }
            let cell = &mut self.cells[y as usize * self.width as usize + cx as usize];
            *cell = Cell { ch, fg, bg: cell.bg };
        }
    }
}

/// Emits only the cells that differ from the previous frame.
///
/// Returns the number of cells written.
pub fn render_diff(out: &mut impl Write, prev: &mut CellBuffer, cur: &CellBuffer) -> io::Result<usize> {
    if prev.size() != cur.size() {
        *prev = CellBuffer::new(cur.width, cur.height);
        // Force every cell out after a resize
        for cell in prev.cells.iter_mut() {
            cell.ch = '\0';
        }
    }

    let mut fg = None;
    let mut bg = None;
    let mut written = 0;
    for y in 0..cur.height {
        for x in 0..cur.width {
            let i = y as usize * cur.width as usize + x as usize;
            if prev.cells[i] == cur.cells[i] {
                continue;
            }
            prev.cells[i] = cur.cells[i];

            let c = cur.cells[i];
            queue!(out, cursor::MoveTo(x, y))?;
            if bg != Some(c.bg) {
                bg = Some(c.bg);
                queue!(out, SetBackgroundColor(to_color(c.bg)))?;
            }
            if fg != Some(c.fg) {
                fg = Some(c.fg);
                queue!(out, SetForegroundColor(to_color(c.fg)))?;
            }
            queue!(out, Print(c.ch))?;
            written += 1;
        }
    }
    Ok(written)
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    }
}

/// Labels that survive the viewport margin test
pub fn visible_labels(output: &FrameOutput) -> impl Iterator<Item = &LabelAnchor> {
    output
        .labels
        .iter()
        .filter(|label| label.is_visible(output.viewport, VISIBILITY_MARGIN))
}

/// Owns raw mode, the alternate screen and mouse capture for its lifetime
pub struct TerminalSession {
    out: io::Stdout,
}

impl TerminalSession {
    pub fn start() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide, DisableLineWrap, EnableMouseCapture)?;
        Ok(TerminalSession { out })
    }

    pub fn out(&mut self) -> &mut io::Stdout {
        &mut self.out
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        // Errors are ignored; there is nowhere left to report them
        let _ = execute!(
            self.out,
            DisableMouseCapture,
            ResetColor,
            EnableLineWrap,
            LeaveAlternateScreen,
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// What the frame loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Terminal view of the turbine: input mapping, overlay and presentation
pub struct TurbineView {
    controller: CameraController,
    canvas: Canvas,
    previous: CellBuffer,
    current: CellBuffer,
    frames_since_last_update: usize,
    last_fps_calculation: Instant,
    fps: f64,
}

impl TurbineView {
    pub fn new(config: &Config) -> Self {
        TurbineView {
            controller: CameraController::new(&config.camera),
            canvas: Canvas::new(0, 0),
            previous: CellBuffer::new(0, 0),
            current: CellBuffer::new(0, 0),
            frames_since_last_update: 0,
            last_fps_calculation: Instant::now(),
            fps: 0.0,
        }
    }

    /// Resizes the canvas to two pixel rows per terminal row
    pub fn resize(&mut self, columns: u16, rows: u16) {
        if self.current.size() != (columns, rows) {
            debug!(columns, rows, "viewport resized");
            self.canvas.resize(columns as usize, rows as usize * 2);
            self.current = CellBuffer::new(columns, rows);
        }
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    /// Applies one input event to the application state
    pub fn handle_event(&mut self, event: &Event, state: &mut AppState, engine: &PhysicsEngine) -> Flow {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key, state, engine),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse, state);
                Flow::Continue
            }
            Event::Resize(columns, rows) => {
                self.resize(*columns, *rows);
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, state: &mut AppState, engine: &PhysicsEngine) -> Flow {
        let inputs = &mut state.inputs;
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('w') => inputs.set_wind_speed(inputs.wind_speed - WIND_STEP),
            KeyCode::Char('W') => inputs.set_wind_speed(inputs.wind_speed + WIND_STEP),
            KeyCode::Char('t') | KeyCode::Char('T') if inputs.autopilot => {
                debug!("manual torque ignored while the autopilot is engaged");
            }
            KeyCode::Char('t') => inputs.set_torque(inputs.torque - TORQUE_STEP),
            KeyCode::Char('T') => inputs.set_torque(inputs.torque + TORQUE_STEP),
            KeyCode::Char('a') => {
                if inputs.autopilot {
                    inputs.autopilot = false;
                } else if engine.state().is_runaway || engine.is_grounded(inputs.wind_speed) {
                    debug!("autopilot request refused");
                } else {
                    inputs.autopilot = true;
                }
            }
            KeyCode::Char('b') => inputs.step_blade_count(-1),
            KeyCode::Char('B') => inputs.step_blade_count(1),
            KeyCode::Char('o') => inputs.set_outer_length(inputs.outer_length - LENGTH_STEP),
            KeyCode::Char('O') => inputs.set_outer_length(inputs.outer_length + LENGTH_STEP),
            KeyCode::Char('i') => inputs.set_inner_length(inputs.inner_length - LENGTH_STEP),
            KeyCode::Char('I') => inputs.set_inner_length(inputs.inner_length + LENGTH_STEP),
            KeyCode::Char('p') | KeyCode::Char('P') => state.paused = !state.paused,
            KeyCode::Char('l') | KeyCode::Char('L') => state.show_labels = !state.show_labels,
            KeyCode::Char('d') | KeyCode::Char('D') => state.debug = !state.debug,
            KeyCode::Char('r') | KeyCode::Char('R') => self.controller.reset(&mut state.camera),
            KeyCode::Char('+') | KeyCode::Char('=') => self.controller.zoom(&mut state.camera, 1.0),
            KeyCode::Char('-') => self.controller.zoom(&mut state.camera, -1.0),
            KeyCode::Left => self.controller.orbit(&mut state.camera, -ARROW_ORBIT, 0.0),
            KeyCode::Right => self.controller.orbit(&mut state.camera, ARROW_ORBIT, 0.0),
            KeyCode::Up => self.controller.orbit(&mut state.camera, 0.0, -ARROW_ORBIT),
            KeyCode::Down => self.controller.orbit(&mut state.camera, 0.0, ARROW_ORBIT),
            _ => {}
        }
        Flow::Continue
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent, state: &mut AppState) {
        // Each cell is one pixel wide and two pixels tall
        let x = mouse.column as f64;
        let y = mouse.row as f64 * 2.0;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.controller.begin_drag(DragMode::Orbit, x, y),
            MouseEventKind::Down(MouseButton::Right | MouseButton::Middle) => {
                self.controller.begin_drag(DragMode::Pan, x, y)
            }
            MouseEventKind::Drag(_) => self.controller.drag_to(&mut state.camera, x, y),
            MouseEventKind::Up(_) => self.controller.end_drag(),
            MouseEventKind::ScrollUp => self.controller.zoom(&mut state.camera, 1.0),
            MouseEventKind::ScrollDown => self.controller.zoom(&mut state.camera, -1.0),
            _ => {}
        }
    }

    /// Draws leader lines, packs the canvas into cells and writes the overlay text
    pub fn compose(&mut self, state: &AppState, output: &FrameOutput, telemetry: &Telemetry) {
        let visible: Vec<&LabelAnchor> = visible_labels(output).collect();
        for label in &visible {
            let color = label.status.map(blade_color).unwrap_or(LEADER);
            self.canvas.draw_line(&label.anchor, &label.target, color);
        }

        self.current.fill_from_canvas(&self.canvas);

        for label in &visible {
            let color = label.status.map(blade_color).unwrap_or(TEXT);
            let column = label.anchor.x.round() as i32;
            let row = (label.anchor.y / 2.0).floor() as i32;
            self.current.write_str(column, row, &label.primary, color);
            if let Some(secondary) = &label.secondary {
                self.current.write_str(column, row + 1, secondary, DIM);
            }
        }

        self.write_hud(state, output, telemetry);
    }

    fn write_hud(&mut self, state: &AppState, output: &FrameOutput, telemetry: &Telemetry) {
        let inputs = &state.inputs;
        let line = format!(
            "RPM {:>3}  TSR {:.1}  {:>2} kW  {}",
            telemetry.rpm, telemetry.tsr, telemetry.kw, telemetry.status
        );
        self.current.write_str(1, 0, &line, blade_color(telemetry.status));

        let line = format!(
            "wind {:.1} m/s  torque {:.0}%  autopilot {}  blades {}  outer {:.0} cm  inner {:.0} cm",
            inputs.wind_speed,
            inputs.torque,
            if inputs.autopilot { "ON" } else { "OFF" },
            inputs.blade_count,
            inputs.outer_length,
            inputs.inner_length
        );
        self.current.write_str(1, 1, &line, TEXT);

        let mut flags = Vec::new();
        if telemetry.is_runaway {
            flags.push("RUNAWAY");
        }
        if telemetry.is_grounded {
            flags.push("GROUNDED");
        }
        if state.paused {
            flags.push("PAUSED");
        }
        self.current.write_str(1, 2, &flags.join("  "), ALERT);

        if state.debug {
            let lines = [
                format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
                format!("FPS: {:.1}", self.fps),
                format!(
                    "Camera: theta {:.2} phi {:.2} radius {:.0}",
                    state.camera.theta, state.camera.phi, state.camera.radius
                ),
                format!("Draws: {}  deployment {:.2}", output.drawn, telemetry.deployment),
            ];
            for (i, line) in lines.iter().enumerate() {
                self.current.write_str(1, 4 + i as i32, line, DIM);
            }
        }

        let (_, rows) = self.current.size();
        self.current.write_str(1, rows as i32 - 1, HELP, DIM);
    }

    /// Sends the composed frame to the terminal
    pub fn present(&mut self, out: &mut impl Write) -> io::Result<usize> {
        queue!(out, BeginSynchronizedUpdate)?;
        let written = render_diff(out, &mut self.previous, &self.current)?;
        queue!(out, EndSynchronizedUpdate)?;
        out.flush()?;
        Ok(written)
    }

    fn update_fps(&mut self) {
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let duration = now.duration_since(self.last_fps_calculation);
        if duration.as_secs_f64() >= 1.0 {
            self.fps = self.frames_since_last_update as f64 / duration.as_secs_f64();
            self.frames_since_last_update = 0;
            self.last_fps_calculation = now;
        }
    }

    /// Interactive frame loop; returns when the user quits or the loop is stopped
    pub fn run(
        &mut self,
        session: &mut TerminalSession,
        sim: &mut SimulationLoop,
        state: &mut AppState,
        fps: u32,
    ) -> io::Result<()> {
        let frame_time = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let mut last_frame = Instant::now();
        execute!(session.out(), terminal::Clear(ClearType::All))?;

        while sim.is_running() {
            let started = Instant::now();

            while event::poll(Duration::ZERO)? {
                let event = event::read()?;
                if self.handle_event(&event, state, sim.engine()) == Flow::Quit {
                    sim.stop();
                }
            }
            if !sim.is_running() {
                break;
            }

            let (columns, rows) = terminal::size()?;
            if self.current.size() != (columns, rows) {
                self.resize(columns, rows);
                execute!(session.out(), terminal::Clear(ClearType::All))?;
            }

            // Simulated time tracks wall time, capped so a stall cannot explode the integrator
            let dt = started.duration_since(last_frame).as_secs_f64().min(0.1);
            last_frame = started;

            let output = sim.frame(state, dt, &mut self.canvas);
            let telemetry = *sim.telemetry();
            self.compose(state, &output, &telemetry);
            self.present(session.out())?;
            self.update_fps();

            let elapsed = started.elapsed();
            if elapsed < frame_time {
                std::thread::sleep(frame_time - elapsed);
            }
        }

        info!(frames = sim.frames(), "frame loop finished");
        Ok(())
    }
}
