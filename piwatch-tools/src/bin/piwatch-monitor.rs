// piwatch-monitor
//
// Live dashboard for multiple Pi-hole instances behind an aggregator.
// Per-node summary stats plus a scrolling feed of recent queries.
//
// Quit:  q / Esc / Ctrl-C
// Pause: p (polling also pauses while the terminal is unfocused)

use chrono::{DateTime, Local, TimeZone};
use crossbeam::channel;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use piwatch::client::{self, Client, FetchError};
use piwatch::config::NodeConfig;
use piwatch::feed::{FeedEngine, QueryEvent};
use piwatch::poll::{PollKind, Scheduler};
use piwatch::stats::{
    self, SummaryRecord, CACHE_PLACEHOLDER, FIELD_PLACEHOLDER, PERCENT_PLACEHOLDER,
    RATE_PLACEHOLDER,
};
use piwatch::status::{NodeStatus, StatusBoard};
use piwatch::view::{FeedView, DEFAULT_MAX_ROWS};
use piwatch_tools::{dash_opts, dash_parseopts};
use serde_json::Value;

#[derive(Debug)]
struct Cli {
    max_rows: usize,
    feed_length: usize,
    fps: u64,
    quiet: bool,
}

fn print_help_and_exit(opts: &getopts::Options, program: &str, code: i32) -> ! {
    let brief = format!(
        "Usage: {program} [options]\n\n\
         Live dashboard for Pi-hole instances behind an aggregator."
    );
    let usage = opts.usage(&brief);
    eprintln!("{usage}");
    std::process::exit(code)
}

fn parse_cli() -> (String, Cli) {
    let mut opts = dash_opts();
    opts.optflag("h", "help", "Show help");
    opts.optopt(
        "",
        "rows",
        "Max feed rows to retain (default 100)",
        "n",
    );
    opts.optopt(
        "",
        "length",
        "Events to request per feed poll (default 50)",
        "n",
    );
    opts.optopt("", "fps", "UI refresh rate (default 10)", "n");
    opts.optflag("", "quiet", "Suppress footer hint");

    let (matches, url) = dash_parseopts(&opts, &std::env::args().collect::<Vec<_>>());
    if matches.opt_present("help") {
        print_help_and_exit(
            &opts,
            &std::env::args()
                .next()
                .unwrap_or_else(|| "piwatch-monitor".into()),
            0,
        );
    }

    let max_rows = matches
        .opt_str("rows")
        .as_deref()
        .unwrap_or("100")
        .parse()
        .unwrap_or(DEFAULT_MAX_ROWS);
    let feed_length = matches
        .opt_str("length")
        .as_deref()
        .unwrap_or("50")
        .parse()
        .unwrap_or(50);
    let fps = matches
        .opt_str("fps")
        .as_deref()
        .unwrap_or("10")
        .parse()
        .unwrap_or(10);
    let quiet = matches.opt_present("quiet");

    (
        url,
        Cli {
            max_rows,
            feed_length,
            fps,
            quiet,
        },
    )
}

enum PollResult {
    Summary(Result<HashMap<String, Value>, FetchError>),
    Feed(Result<HashMap<String, Vec<QueryEvent>>, FetchError>),
}

struct NodeRow {
    name: String,
    status: NodeStatus,
    cells: [String; 8],
}

fn node_row(
    node: &NodeConfig,
    summaries: &HashMap<String, SummaryRecord>,
    statuses: &StatusBoard,
) -> NodeRow {
    let status = statuses.get(&node.name);
    let cells = match summaries.get(&node.name) {
        Some(rec) if status == NodeStatus::Healthy => [
            stats::format_count(rec.total),
            stats::format_count(rec.blocked),
            format!("{:.1}%", rec.percent_blocked),
            format!(
                "{} / {}",
                stats::format_count(rec.cached),
                stats::format_count(rec.forwarded)
            ),
            stats::format_count(rec.unique_domains),
            stats::format_count(rec.clients),
            stats::format_count(rec.list_domains),
            stats::format_rate(rec.rate),
        ],
        _ => [
            FIELD_PLACEHOLDER.to_string(),
            FIELD_PLACEHOLDER.to_string(),
            PERCENT_PLACEHOLDER.to_string(),
            CACHE_PLACEHOLDER.to_string(),
            FIELD_PLACEHOLDER.to_string(),
            FIELD_PLACEHOLDER.to_string(),
            FIELD_PLACEHOLDER.to_string(),
            RATE_PLACEHOLDER.to_string(),
        ],
    };
    NodeRow {
        name: node.name.clone(),
        status,
        cells,
    }
}

fn apply_summary(
    result: Result<HashMap<String, Value>, FetchError>,
    nodes: &[NodeConfig],
    summaries: &mut HashMap<String, SummaryRecord>,
    statuses: &mut StatusBoard,
) {
    match result {
        Ok(data) => {
            for node in nodes {
                match client::node_payload(&data, &node.name) {
                    Ok(payload) => {
                        summaries.insert(node.name.clone(), stats::project_summary(payload));
                        statuses.mark_success(&node.name);
                    }
                    Err(_) => {
                        summaries.remove(&node.name);
                        statuses.mark_failure(&node.name);
                    }
                }
            }
        }
        Err(_) => {
            // Whole-poll failure; every node goes unreachable, the
            // session keeps running.
            for node in nodes {
                summaries.remove(&node.name);
                statuses.mark_failure(&node.name);
            }
        }
    }
}

fn apply_initial(
    data: HashMap<String, Value>,
    nodes: &[NodeConfig],
    summaries: &mut HashMap<String, SummaryRecord>,
    statuses: &mut StatusBoard,
) -> Option<DateTime<Local>> {
    // An aggregator may omit the startup data payload entirely; nodes then
    // stay Unknown until the first scheduled poll reports something real.
    if data.is_empty() {
        return None;
    }
    apply_summary(Ok(data), nodes, summaries, statuses);
    Some(Local::now())
}

fn apply_feed(
    mut map: HashMap<String, Vec<QueryEvent>>,
    nodes: &[NodeConfig],
    engine: &mut FeedEngine,
    feed_view: &mut FeedView,
    feed_area: (usize, usize),
) {
    // Node order is fixed by the config, not by the payload map.
    let mut batches = Vec::new();
    for node in nodes {
        if let Some(events) = map.remove(&node.name) {
            batches.push((node.name.clone(), events));
        }
    }
    let novel = engine.ingest(&batches);
    feed_view.push_batch(novel, Instant::now());
    let (area_rows, width) = feed_area;
    feed_view.enforce(area_rows, width);
}

fn event_time(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(event::EnableFocusChange)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(event::DisableFocusChange);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        header: &str,
        last_updated: &Option<DateTime<Local>>,
        rows: &[NodeRow],
        feed_view: &FeedView,
        now: Instant,
        paused: bool,
        quiet: bool,
    ) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?;

        // Header
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(header))?;
        if paused {
            self.stdout.queue(SetForegroundColor(Color::Yellow))?;
            self.stdout.queue(style::Print("  [paused]"))?;
            self.stdout.queue(ResetColor)?;
        }
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        let updated = match last_updated {
            Some(t) => format!("Last updated: {}", t.format("%H:%M:%S")),
            None => "Last updated: --".to_string(),
        };
        self.stdout.queue(style::Print(updated))?;
        self.stdout.queue(cursor::MoveToNextLine(2))?;

        // Table header
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(format!(
            "{:<14} {:>1}  {:>10}  {:>10}  {:>7}  {:>19}  {:>9}  {:>8}  {:>10}  {:>9}",
            "node", " ", "total", "blocked", "pct", "cachd/fwded", "unique", "clients", "listed", "rate"
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        // Node rows
        for row in rows {
            let dot_color = match row.status {
                NodeStatus::Unknown => Color::DarkGrey,
                NodeStatus::Healthy => Color::Green,
                NodeStatus::Unreachable => Color::Red,
            };
            let text_color = match row.status {
                NodeStatus::Healthy => Color::White,
                _ => Color::DarkGrey,
            };
            self.stdout.queue(style::Print(format!("{:<14} ", row.name)))?;
            self.stdout.queue(SetForegroundColor(dot_color))?;
            self.stdout.queue(style::Print("●"))?;
            self.stdout.queue(SetForegroundColor(text_color))?;
            self.stdout.queue(style::Print(format!(
                "  {:>10}  {:>10}  {:>7}  {:>19}  {:>9}  {:>8}  {:>10}  {:>9}",
                row.cells[0],
                row.cells[1],
                row.cells[2],
                row.cells[3],
                row.cells[4],
                row.cells[5],
                row.cells[6],
                row.cells[7],
            )))?;
            self.stdout.queue(ResetColor)?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }

        // Feed section
        if !feed_view.is_empty() {
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            self.stdout.queue(SetAttribute(Attribute::Bold))?;
            self.stdout
                .queue(style::Print(format!("Recent Queries ({}):", feed_view.len())))?;
            self.stdout.queue(SetAttribute(Attribute::Reset))?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;

            for feed_row in feed_view.rows() {
                if !feed_row.revealed(now) {
                    continue;
                }
                let color = if feed_row.entry.event.blocked {
                    Color::Red
                } else {
                    Color::Green
                };
                self.stdout.queue(SetForegroundColor(color))?;
                if feed_row.highlighted(now) {
                    self.stdout.queue(SetAttribute(Attribute::Bold))?;
                }
                self.stdout.queue(style::Print(format!(
                    "[{}] {}  {}",
                    event_time(feed_row.entry.event.timestamp),
                    feed_row.entry.node,
                    feed_row.entry.event.domain,
                )))?;
                self.stdout.queue(SetAttribute(Attribute::Reset))?;
                self.stdout.queue(ResetColor)?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
        }

        if !quiet {
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            self.stdout.queue(style::Print("q/Esc to quit, p to pause"))?;
        }

        self.stdout.flush()
    }
}

/// Rows and width available for the feed region at the current terminal
/// size, after the header, table and footer have taken their share.
fn feed_area(term: (u16, u16), node_count: usize, quiet: bool) -> (usize, usize) {
    let (cols, rows) = term;
    let fixed = 4 + node_count + 2 + if quiet { 0 } else { 2 };
    let area_rows = (rows as usize).saturating_sub(fixed);
    (area_rows, cols as usize)
}

fn main() {
    let (url, cli) = parse_cli();

    let client = match Client::new(&url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client for {}: {}", url, e);
            std::process::exit(1);
        }
    };

    // Startup fetch outside the TUI so a dead aggregator fails loudly.
    let init = match client.init() {
        Ok(init) => init,
        Err(e) => {
            eprintln!("Failed to reach aggregator at {}: {}", url, e);
            std::process::exit(1);
        }
    };
    let config = init.config;
    let nodes: Vec<NodeConfig> = config.enabled_nodes().into_iter().cloned().collect();
    if nodes.is_empty() {
        eprintln!("No enabled nodes in aggregator config");
        std::process::exit(1);
    }

    let mut tui = Tui::setup().expect("TUI setup failed");
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut t = Tui {
            stdout: io::stdout(),
        };
        t.teardown();
        original_hook(panic_info);
    }));

    let mut summaries: HashMap<String, SummaryRecord> = HashMap::new();
    let mut statuses = StatusBoard::new(nodes.iter().map(|n| n.name.as_str()));
    let mut engine = FeedEngine::new();
    let mut feed_view = FeedView::new(cli.max_rows);

    // The init payload doubles as the first summary poll.
    let mut last_updated = apply_initial(init.data, &nodes, &mut summaries, &mut statuses);

    let refresh_ms = config.refresh_interval_ms();
    let (mut scheduler, tick_rx) = Scheduler::new(refresh_ms, config.show_queries);
    scheduler.start();

    let (res_tx, res_rx) = channel::unbounded::<PollResult>();

    // Keyboard and focus handler
    let (key_tx, key_rx) = channel::unbounded();
    std::thread::spawn(move || loop {
        if let Ok(ev) = event::read() {
            let _ = key_tx.send(ev);
        }
    });

    let frame = Duration::from_millis(1000 / cli.fps.max(1));
    let frame_tick = channel::tick(frame);

    let header = format!(
        "piwatch-monitor — {}  refresh={}ms  feed={}  fps={}",
        url,
        refresh_ms,
        if config.show_queries { "on" } else { "off" },
        cli.fps
    );

    let mut manual_pause = false;
    let mut focus_lost = false;

    'main: loop {
        crossbeam::select! {
            recv(key_rx) -> ev => {
                match ev {
                    Ok(event::Event::Key(k)) => {
                        use event::{KeyCode, KeyModifiers};
                        let quit = k.code == KeyCode::Char('q')
                                 || k.code == KeyCode::Esc
                                 || (k.code == KeyCode::Char('c') && k.modifiers == KeyModifiers::CONTROL);
                        if quit { break 'main; }
                        if k.code == KeyCode::Char('p') {
                            manual_pause = !manual_pause;
                        }
                    }
                    Ok(event::Event::FocusLost) => { focus_lost = true; }
                    Ok(event::Event::FocusGained) => { focus_lost = false; }
                    Ok(_) => {}
                    Err(_) => break 'main,
                }
                // Start/stop are idempotent, so reapplying the desired
                // state after every input event cannot stack timers.
                if manual_pause || focus_lost {
                    scheduler.pause();
                } else {
                    scheduler.resume();
                }
            }

            recv(tick_rx) -> kind => {
                // Each tick dispatches an independent fetch; completions of
                // overlapping polls are applied in arrival order.
                match kind {
                    Ok(PollKind::Summary) => {
                        let client = client.clone();
                        let res_tx = res_tx.clone();
                        std::thread::spawn(move || {
                            let _ = res_tx.send(PollResult::Summary(client.data()));
                        });
                    }
                    Ok(PollKind::Feed) => {
                        let client = client.clone();
                        let res_tx = res_tx.clone();
                        let length = cli.feed_length;
                        std::thread::spawn(move || {
                            let _ = res_tx.send(PollResult::Feed(client.queries(length)));
                        });
                    }
                    Err(_) => break 'main,
                }
            }

            recv(res_rx) -> res => {
                match res {
                    Ok(PollResult::Summary(result)) => {
                        apply_summary(result, &nodes, &mut summaries, &mut statuses);
                        last_updated = Some(Local::now());
                    }
                    Ok(PollResult::Feed(Ok(map))) => {
                        let area = terminal::size()
                            .map(|size| feed_area(size, nodes.len(), cli.quiet))
                            .unwrap_or((cli.max_rows, 80));
                        apply_feed(map, &nodes, &mut engine, &mut feed_view, area);
                    }
                    // Feed polls are best-effort; failures say nothing
                    // about node health.
                    Ok(PollResult::Feed(Err(_))) => {}
                    Err(_) => break 'main,
                }
            }

            recv(frame_tick) -> _ => {
                let now = Instant::now();
                let area = terminal::size()
                    .map(|size| feed_area(size, nodes.len(), cli.quiet))
                    .unwrap_or((cli.max_rows, 80));
                feed_view.enforce(area.0, area.1);

                let rows: Vec<NodeRow> = nodes
                    .iter()
                    .map(|node| node_row(node, &summaries, &statuses))
                    .collect();

                let paused = manual_pause || focus_lost;
                if tui.draw(&header, &last_updated, &rows, &feed_view, now, paused, cli.quiet).is_err() {
                    break 'main;
                }
            }
        }
    }

    scheduler.pause();
    tui.teardown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(name: &str) -> NodeConfig {
        serde_json::from_value(json!({ "name": name, "enabled": true })).unwrap()
    }

    fn summary_payload(total: u64) -> Value {
        json!({ "queries": { "total": total, "frequency": 2.3 } })
    }

    #[test]
    fn fetch_failure_goes_unreachable_and_recovery_restores_values() {
        let nodes = vec![node("attic")];
        let mut summaries = HashMap::new();
        let mut statuses = StatusBoard::new(["attic"]);

        let mut data = HashMap::new();
        data.insert("attic".to_string(), summary_payload(42));
        apply_summary(Ok(data), &nodes, &mut summaries, &mut statuses);
        assert_eq!(statuses.get("attic"), NodeStatus::Healthy);
        let row = node_row(&nodes[0], &summaries, &statuses);
        assert_eq!(row.cells[0], "42");
        assert_eq!(row.cells[7], "2.3/sec");

        // Whole poll fails: status flips, every field shows a placeholder.
        apply_summary(
            Err(FetchError::Transport("connection refused".into())),
            &nodes,
            &mut summaries,
            &mut statuses,
        );
        assert_eq!(statuses.get("attic"), NodeStatus::Unreachable);
        let row = node_row(&nodes[0], &summaries, &statuses);
        assert_eq!(row.cells[0], FIELD_PLACEHOLDER);
        assert_eq!(row.cells[2], PERCENT_PLACEHOLDER);
        assert_eq!(row.cells[3], CACHE_PLACEHOLDER);
        assert_eq!(row.cells[7], RATE_PLACEHOLDER);

        // Next successful fetch restores live values.
        let mut data = HashMap::new();
        data.insert("attic".to_string(), summary_payload(50));
        apply_summary(Ok(data), &nodes, &mut summaries, &mut statuses);
        assert_eq!(statuses.get("attic"), NodeStatus::Healthy);
        let row = node_row(&nodes[0], &summaries, &statuses);
        assert_eq!(row.cells[0], "50");
    }

    #[test]
    fn empty_init_payload_leaves_nodes_unknown() {
        let nodes = vec![node("attic")];
        let mut summaries = HashMap::new();
        let mut statuses = StatusBoard::new(["attic"]);

        let updated = apply_initial(HashMap::new(), &nodes, &mut summaries, &mut statuses);
        assert!(updated.is_none());
        assert_eq!(statuses.get("attic"), NodeStatus::Unknown);
        let row = node_row(&nodes[0], &summaries, &statuses);
        assert_eq!(row.cells[0], FIELD_PLACEHOLDER);

        // A populated startup payload is applied like any summary poll.
        let mut data = HashMap::new();
        data.insert("attic".to_string(), summary_payload(7));
        let updated = apply_initial(data, &nodes, &mut summaries, &mut statuses);
        assert!(updated.is_some());
        assert_eq!(statuses.get("attic"), NodeStatus::Healthy);
    }

    #[test]
    fn embedded_error_fails_only_that_node() {
        let nodes = vec![node("attic"), node("garage")];
        let mut summaries = HashMap::new();
        let mut statuses = StatusBoard::new(["attic", "garage"]);

        let mut data = HashMap::new();
        data.insert("attic".to_string(), summary_payload(10));
        data.insert("garage".to_string(), json!({ "error": "auth failed" }));
        apply_summary(Ok(data), &nodes, &mut summaries, &mut statuses);

        assert_eq!(statuses.get("attic"), NodeStatus::Healthy);
        assert_eq!(statuses.get("garage"), NodeStatus::Unreachable);
    }

    #[test]
    fn feed_batches_follow_config_node_order() {
        let nodes = vec![node("attic"), node("garage")];
        let mut engine = FeedEngine::new();
        let mut feed_view = FeedView::new(10);

        let event = |ts, domain: &str| QueryEvent {
            timestamp: ts,
            domain: domain.to_string(),
            blocked: false,
        };
        let mut map = HashMap::new();
        map.insert("garage".to_string(), vec![event(1, "g.com")]);
        map.insert("attic".to_string(), vec![event(2, "a.com")]);
        map.insert("unconfigured".to_string(), vec![event(3, "x.com")]);

        apply_feed(map, &nodes, &mut engine, &mut feed_view, (10, 80));

        let order: Vec<_> = feed_view.rows().map(|r| r.entry.node.clone()).collect();
        assert_eq!(order, ["attic", "garage"]);
    }

    #[test]
    fn feed_area_leaves_room_for_the_chrome() {
        let (rows, width) = feed_area((80, 24), 2, false);
        assert_eq!(width, 80);
        // 4 header/table lines, 2 nodes, 2 feed chrome, 2 footer.
        assert_eq!(rows, 24 - 10);

        let (rows_quiet, _) = feed_area((80, 24), 2, true);
        assert_eq!(rows_quiet, rows + 2);

        // Tiny terminals saturate to zero instead of underflowing.
        assert_eq!(feed_area((80, 4), 10, false).0, 0);
    }

    #[test]
    fn event_time_handles_out_of_range_timestamps() {
        assert_eq!(event_time(i64::MAX), "--:--:--");
        assert_eq!(event_time(0).len(), 8);
    }
}
