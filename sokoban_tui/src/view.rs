use std::{
    collections::VecDeque,
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::Result;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use sokoban_core::{
    Direction as Move,
    board::Action,
    environment::{SokobanConfig, SokobanEnv, StepResult},
    solver::solve_room,
    tile::Tile,
};

struct App {
    /// The live environment being played.
    env: SokobanEnv,
    /// Result of the most recent step.
    last: StepResult,
    /// Reward collected in the current episode.
    episode_reward: f32,
    episodes: usize,
    /// Moves left to replay from the solver.
    plan: VecDeque<Move>,
    max_nodes: usize,
    status: String,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(config: SokobanConfig, max_nodes: usize) -> Result<Self> {
        let mut env = SokobanEnv::new(config)?;
        // a negative action index reports the first episode without stepping
        let last = env.step_index(-1)?;
        Ok(App {
            env,
            last,
            episode_reward: 0.0,
            episodes: 0,
            plan: VecDeque::new(),
            max_nodes,
            status: String::new(),
            should_quit: false,
        })
    }

    fn act(&mut self, action: Action) -> Result<()> {
        let result = self.env.step(action)?;
        self.episode_reward += result.reward;
        if result.terminated || result.truncated {
            self.status = format!(
                "episode {} {} with reward {:.1}",
                self.episodes,
                if result.terminated { "solved" } else { "out of steps" },
                self.episode_reward
            );
            self.episodes += 1;
            self.episode_reward = 0.0;
            self.plan.clear();
        }
        self.last = result;
        Ok(())
    }

    fn plan(&mut self) -> Result<()> {
        let outcome = solve_room(self.env.board().room(), self.max_nodes)?;
        if outcome.is_solved() {
            self.status = format!(
                "plan of {} moves found in {} search steps",
                outcome.actions.len(),
                outcome.search_steps
            );
            self.plan = outcome.actions.into();
        } else {
            self.status = format!("no plan: {}", outcome.state);
        }
        Ok(())
    }

    /// Replays one planned move.
    fn tick(&mut self) -> Result<()> {
        match self.plan.pop_front() {
            Some(d) => self.act(Action::Push(d)),
            None => Ok(()),
        }
    }

    fn on_key(&mut self, code: KeyCode) -> Result<()> {
        let push = |d| Some(Action::Push(d));
        let action = match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Char('p') => {
                self.plan()?;
                None
            }
            KeyCode::Up => push(Move::Up),
            KeyCode::Down => push(Move::Down),
            KeyCode::Left => push(Move::Left),
            KeyCode::Right => push(Move::Right),
            KeyCode::Char(' ') => Some(Action::Noop),
            _ => None,
        };
        if let Some(action) = action {
            // manual play abandons any plan
            self.plan.clear();
            self.act(action)?;
        }
        Ok(())
    }
}

pub fn run(config: SokobanConfig, max_nodes: usize) -> Result<()> {
    // Build the app before touching the terminal so config errors print normally
    let mut app = App::new(config, max_nodes)?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(150);
    let mut last_tick = Instant::now();

    while !app.should_quit {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key.code)?;
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick()?;
            last_tick = Instant::now();
        }
    }
    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),   // room
            Constraint::Length(6), // episode stats
            Constraint::Length(2), // help
        ])
        .split(frame.area());

    render_room(frame, main_layout[0], app);
    render_stats(frame, main_layout[1], app);

    let help_text = Paragraph::new("arrows: push  space: wait  p: plan with solver  q/Esc: quit")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn tile_span(tile: Tile) -> Span<'static> {
    let [r, g, b] = tile.color();
    let style = Style::default().bg(Color::Rgb(r, g, b));
    let style = if tile.is_player() {
        style.fg(Color::White).bold()
    } else {
        style.fg(Color::Black)
    };
    // two columns per cell keeps the room roughly square
    let text = match tile {
        Tile::Wall | Tile::Empty => "  ".to_string(),
        _ => format!("{0}{0}", tile.to_char()),
    };
    Span::styled(text, style)
}

fn render_room(frame: &mut Frame, area: Rect, app: &App) {
    let room = app.env.board().room();
    let lines: Vec<Line> = room
        .tiles()
        .rows()
        .map(|row| Line::from(row.iter().map(|t| tile_span(*t)).collect::<Vec<_>>()))
        .collect();

    let info = &app.last.info;
    let title = format!(
        "Sokoban  {}  file {} room {}",
        app.env.config().levels_dir.display(),
        info.file_index,
        info.room_index
    );
    let room_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(room_paragraph, area);
}

fn render_stats(frame: &mut Frame, area: Rect, app: &App) {
    let info = &app.last.info;
    let items = vec![
        ListItem::new(format!(
            "Step {}/{}  last reward {:.2}  episode reward {:.2}",
            info.elapsed_steps,
            app.env.episode_budget(),
            app.last.reward,
            app.episode_reward
        )),
        ListItem::new(format!(
            "Unmatched boxes: {}  episodes finished: {}",
            info.unmatched_boxes, app.episodes
        )),
        ListItem::new(format!("Planned moves left: {}", app.plan.len())),
        ListItem::new(Span::styled(
            app.status.clone(),
            Style::default().fg(Color::Yellow),
        )),
    ];
    let stats = List::new(items).block(Block::default().borders(Borders::ALL).title("Episode"));
    frame.render_widget(stats, area);
}
