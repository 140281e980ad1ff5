//! Interface de terminal: uma barra por posição ativa e linhas de status.
//!
//! Usa `indicatif` para as barras de contagem e `console` para as cores dos
//! indicadores. Toda a saída passa por [`dispatch`], o único consumidor dos
//! eventos dos timers e dos avisos da sessão.

use std::collections::BTreeMap;

use chrono::Local;
use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::grid::PositionMapper;
use crate::store::TimerRecord;
use crate::timer::{Indicator, TimerEvent, TimerEventKind, TimerId, TimerSnapshot, TimerState};

/// Mensagens da sessão para o operador.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Status(String),
    Warning(String),
    /// Rejeição que o operador precisa ver antes de escanear de novo.
    Alert { title: String, message: String },
    Saved(TimerRecord),
}

/// Destino da apresentação. Chamado sempre a partir de uma única tarefa.
pub trait Surface {
    fn render_slot(&mut self, snapshot: &TimerSnapshot);
    fn clear_slot(&mut self, code: &str);
    fn status(&mut self, line: &str);
    fn alert(&mut self, title: &str, message: &str);
    fn record_saved(&mut self, record: &TimerRecord);

    fn warning(&mut self, line: &str) {
        self.status(line);
    }
}

/// Contadores da grade mantidos pelo consumidor de eventos.
#[derive(Debug, Default, Clone)]
pub struct GridTally {
    slots: BTreeMap<TimerId, TimerState>,
    completions: u64,
}

impl GridTally {
    pub fn apply(&mut self, event: &TimerEvent) {
        let id = event.snapshot.id;
        match event.kind {
            TimerEventKind::Removed => {
                self.slots.remove(&id);
            }
            TimerEventKind::Completed => {
                self.completions += 1;
                self.slots.insert(id, TimerState::Completed);
            }
            _ => {
                self.slots.insert(id, event.snapshot.state);
            }
        }
    }

    pub fn running(&self) -> usize {
        self.count(TimerState::Running)
    }

    pub fn paused(&self) -> usize {
        self.count(TimerState::Paused)
    }

    /// Total de contagens que chegaram a zero nesta sessão.
    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn summary(&self) -> String {
        format!(
            "Running: {} | Paused: {} | Completed: {}",
            self.running(),
            self.paused(),
            self.completions
        )
    }

    fn count(&self, state: TimerState) -> usize {
        self.slots.values().filter(|s| **s == state).count()
    }
}

/// Consome eventos e avisos em série até os dois canais fecharem.
pub async fn dispatch<U: Surface>(
    mut events: UnboundedReceiver<TimerEvent>,
    mut notices: UnboundedReceiver<Notice>,
    surface: &mut U,
) -> GridTally {
    let mut tally = GridTally::default();
    let mut events_open = true;
    let mut notices_open = true;

    while events_open || notices_open {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    tally.apply(&event);
                    show_event(surface, &event, &tally);
                }
                None => events_open = false,
            },
            notice = notices.recv(), if notices_open => match notice {
                Some(notice) => show_notice(surface, &notice),
                None => notices_open = false,
            },
        }
    }
    tally
}

fn show_event<U: Surface>(surface: &mut U, event: &TimerEvent, tally: &GridTally) {
    let snapshot = &event.snapshot;
    match event.kind {
        TimerEventKind::Removed => surface.clear_slot(&snapshot.code),
        TimerEventKind::Completed => {
            surface.render_slot(snapshot);
            surface.status(&format!("{} completed. {}", snapshot.code, tally.summary()));
        }
        TimerEventKind::Tick => {
            debug!(code = %snapshot.code, remaining = snapshot.remaining, "Render tick");
            surface.render_slot(snapshot);
        }
        _ => surface.render_slot(snapshot),
    }
}

fn show_notice<U: Surface>(surface: &mut U, notice: &Notice) {
    match notice {
        Notice::Status(line) => surface.status(line),
        Notice::Warning(line) => surface.warning(line),
        Notice::Alert { title, message } => surface.alert(title, message),
        Notice::Saved(record) => surface.record_saved(record),
    }
}

/// Superfície de terminal: barras `indicatif` ordenadas pela posição na grade.
pub struct ConsoleSurface {
    multi: MultiProgress,
    bars: BTreeMap<String, ProgressBar>,
    bar_style: ProgressStyle,
    verbose: bool,
    gray: Style,
    light_green: Style,
    yellow: Style,
    green: Style,
    red: Style,
}

impl ConsoleSurface {
    pub fn new(verbose: bool) -> Self {
        let bar_style = ProgressStyle::default_bar()
            .template("{msg} [{bar:30.cyan/blue}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stdout()),
            bars: BTreeMap::new(),
            bar_style,
            verbose,
            gray: Style::new().dim(),
            light_green: Style::new().green(),
            yellow: Style::new().yellow(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    fn indicator_style(&self, indicator: Indicator) -> &Style {
        match indicator {
            Indicator::Gray => &self.gray,
            Indicator::LightGreen => &self.light_green,
            Indicator::Yellow => &self.yellow,
            Indicator::Green => &self.green,
        }
    }

    fn println(&self, line: String) {
        if self.multi.is_hidden() {
            println!("{line}");
        } else {
            let _ = self.multi.println(line);
        }
    }
}

impl Surface for ConsoleSurface {
    fn render_slot(&mut self, snapshot: &TimerSnapshot) {
        let bar = match self.bars.get(&snapshot.code) {
            Some(bar) => bar.clone(),
            None => {
                let index = self.bars.range(..snapshot.code.clone()).count();
                let bar = self
                    .multi
                    .insert(index, ProgressBar::new(u64::from(snapshot.total)));
                bar.set_style(self.bar_style.clone());
                self.bars.insert(snapshot.code.clone(), bar.clone());
                bar
            }
        };
        bar.set_length(u64::from(snapshot.total.max(1)));
        bar.set_position(u64::from(snapshot.total - snapshot.remaining.min(snapshot.total)));
        let style = self.indicator_style(snapshot.indicator());
        bar.set_message(format!(
            "{} {:<5} {:<9} {:>12}",
            style.apply_to("●"),
            snapshot.code,
            snapshot.state.to_string(),
            snapshot.display
        ));
    }

    fn clear_slot(&mut self, code: &str) {
        if let Some(bar) = self.bars.remove(code) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn status(&mut self, line: &str) {
        self.println(format!("{} - {line}", Local::now().format("%H:%M:%S")));
    }

    fn warning(&mut self, line: &str) {
        let line = self.yellow.apply_to(line).to_string();
        self.status(&line);
    }

    fn alert(&mut self, title: &str, message: &str) {
        self.println(format!(
            "  {} {}: {message}",
            self.red.apply_to("✗"),
            self.red.apply_to(title)
        ));
    }

    fn record_saved(&mut self, record: &TimerRecord) {
        self.println(format!(
            "  {} Saved {} for {}",
            self.green.apply_to("✓"),
            record.codes(),
            record.barcode
        ));
        if self.verbose {
            self.println(serde_json::to_string_pretty(record).unwrap_or_default());
        }
    }
}

/// Tabela da grade em ordem de linha, usada pelo comando `grid`.
pub fn render_grid(mapper: &PositionMapper) -> String {
    let mut out = format!(
        "{} rows x {} slots ({} columns, odd numbers in column 0)\n",
        mapper.rows().count(),
        mapper.slots_per_row(),
        mapper.columns()
    );
    for (row, positions) in mapper.rows() {
        let codes: Vec<String> = positions.iter().map(|p| p.code()).collect();
        out.push_str(&format!("{row}: {}\n", codes.join(" ")));
    }
    out
}

/// Linhas do comando `:list`, uma por timer.
pub fn render_list(snapshots: &[TimerSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No timers armed".to_string();
    }
    snapshots
        .iter()
        .map(|s| {
            format!(
                "{:<5} {:<9} {:>9} {}",
                s.code,
                s.state.to_string(),
                s.display,
                s.barcode.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
