use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use planboard_shared::OrderDto;
use tracing::{debug, info, instrument, warn};

use crate::board::{Board, BoardEvent, OrderCard, OrderNavigator};
use crate::capability::Viewer;
use crate::cli::Invocation;
use crate::config::StoreBackend;
use crate::convert::order_to_dto;
use crate::datastore::parse_import_items;
use crate::datetime::{MonthRef, parse_day};
use crate::gesture::Gesture;
use crate::optimistic::SyncEvent;
use crate::order::{Order, OrderId};
use crate::render::{Renderer, describe_event};
use crate::store::{FileOrderStore, OrderStore};

pub const DEFAULT_COMMAND: &str = "month";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "month",
        "day",
        "pool",
        "list",
        "info",
        "schedule",
        "unschedule",
        "board",
        "import",
        "export",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs besides the order store.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub viewer: Viewer,
    pub today: NaiveDate,
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
    pub renderer: Renderer,
}

#[instrument(skip(store, ctx, inv), fields(command = %inv.command))]
pub async fn dispatch<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    inv: Invocation,
) -> anyhow::Result<()> {
    let args = inv.command_args.as_slice();
    debug!(args = ?args, backend = ctx.backend.as_str(), "dispatching command");

    match inv.command.as_str() {
        "month" => cmd_month(store, ctx, args).await,
        "day" => cmd_day(store, ctx, args).await,
        "pool" => cmd_pool(store, ctx).await,
        "list" => cmd_list(store, ctx).await,
        "info" => cmd_info(store, ctx, args).await,
        "schedule" => cmd_schedule(store, ctx, args).await,
        "unschedule" => cmd_unschedule(store, ctx, args).await,
        "board" => cmd_board(store, ctx, args).await,
        "import" => cmd_import(ctx, args),
        "export" => cmd_export(store, ctx).await,
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

async fn mount<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    month: MonthRef,
) -> anyhow::Result<Board<S>> {
    let mut board = Board::mount(store, ctx.viewer.clone(), month, ctx.today).await;

    // A board that could not load anything is useless to a one-shot command.
    let failed = board
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            SyncEvent::ReloadFailed(err) => Some(err),
            _ => None,
        });
    if let Some(err) = failed {
        return Err(anyhow::Error::new(err).context("failed to load orders"));
    }

    Ok(board)
}

/// Waits for background saves and reports how many of them failed.
async fn finish<S: OrderStore + 'static>(
    board: &mut Board<S>,
    renderer: &Renderer,
) -> anyhow::Result<usize> {
    board.settle().await;

    let mut failures = 0;
    for event in board.drain_events() {
        match &event {
            SyncEvent::PatchFailed(err) | SyncEvent::ReloadFailed(err) => {
                warn!(error = %err, "order sync failed");
                failures += 1;
                renderer.print_sync_event(&event)?;
            }
            SyncEvent::PatchConfirmed { order_id } => {
                debug!(order_id = %order_id, "order sync confirmed");
            }
            SyncEvent::Reloaded { count } => {
                debug!(count, "orders reloaded after failed sync");
            }
        }
    }
    Ok(failures)
}

fn month_arg(args: &[String], today: NaiveDate) -> anyhow::Result<MonthRef> {
    match args.first() {
        Some(raw) => MonthRef::parse(raw, today),
        None => Ok(MonthRef::of(today)),
    }
}

fn order_arg(args: &[String], idx: usize, usage: &str) -> anyhow::Result<OrderId> {
    args.get(idx)
        .map(|raw| OrderId::new(raw.trim()))
        .filter(|id| !id.as_str().is_empty())
        .ok_or_else(|| anyhow!("usage: {usage}"))
}

fn day_arg(
    args: &[String],
    idx: usize,
    today: NaiveDate,
    usage: &str,
) -> anyhow::Result<NaiveDate> {
    let raw = args.get(idx).ok_or_else(|| anyhow!("usage: {usage}"))?;
    parse_day(raw, today)
}

async fn cmd_month<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let month = month_arg(args, ctx.today)?;
    info!(%month, "command month");

    let board = mount(store, ctx, month).await?;
    ctx.renderer
        .print_month(&board.grid(), board.range_state(), board.today())?;
    println!();
    ctx.renderer.print_pool(&board.pool())
}

async fn cmd_day<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let day = day_arg(args, 0, ctx.today, "planboard day <YYYY-MM-DD>")?;
    info!(day = %day, "command day");

    let mut board = mount(store, ctx, MonthRef::of(day)).await?;
    match board.handle(Gesture::Click(Some(day))) {
        BoardEvent::DayDetailOpened(_) => {}
        other => bail!("could not open day {day}: {}", describe_event(&other)),
    }

    let detail = board
        .day_detail()
        .ok_or_else(|| anyhow!("day detail for {day} did not open"))?;
    ctx.renderer.print_day_detail(&detail)
}

async fn cmd_pool<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    info!("command pool");
    let board = mount(store, ctx, MonthRef::of(ctx.today)).await?;
    ctx.renderer.print_pool(&board.pool())
}

async fn cmd_list<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    info!("command list");
    let board = mount(store, ctx, MonthRef::of(ctx.today)).await?;
    ctx.renderer.print_order_table(&board.orders(), board.today())
}

struct PrintNavigator<'a> {
    renderer: &'a Renderer,
}

impl OrderNavigator for PrintNavigator<'_> {
    fn open_order(&self, card: &OrderCard) {
        if let Err(err) = self.renderer.print_card(card) {
            warn!(order_id = %card.id, error = %err, "failed to print order card");
        }
    }
}

async fn cmd_info<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let id = order_arg(args, 0, "planboard info <order-id>")?;
    info!(order_id = %id, "command info");

    let board = mount(store, ctx, MonthRef::of(ctx.today)).await?;
    board.open_order(
        &id,
        &PrintNavigator {
            renderer: &ctx.renderer,
        },
    )?;
    Ok(())
}

async fn cmd_schedule<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let usage = "planboard schedule <order-id> <start> [end]";
    let id = order_arg(args, 0, usage)?;
    let start = day_arg(args, 1, ctx.today, usage)?;
    let end = match args.get(2) {
        Some(raw) => Some(parse_day(raw, ctx.today)?),
        None => None,
    };
    info!(order_id = %id, start = %start, end = ?end, "command schedule");

    let mut board = mount(store, ctx, MonthRef::of(start)).await?;

    let mut gestures = vec![Gesture::DragStart(id.clone()), Gesture::Drop(Some(start))];
    if let Some(end) = end {
        gestures.push(Gesture::Click(Some(end)));
    }

    let mut refused = None;
    for gesture in gestures {
        let event = board.handle(gesture);
        ctx.renderer.print_event(&event)?;
        if matches!(event, BoardEvent::Rejected(_) | BoardEvent::Ignored(_)) {
            refused = Some(describe_event(&event));
            break;
        }
    }

    // The single-day placement stands even when the end day is refused.
    let failures = finish(&mut board, &ctx.renderer).await?;
    if let Some(reason) = refused {
        bail!("schedule {id}: {reason}");
    }
    if failures > 0 {
        bail!("schedule {id}: the order store did not accept the change");
    }
    Ok(())
}

async fn cmd_unschedule<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let id = order_arg(args, 0, "planboard unschedule <order-id>")?;
    info!(order_id = %id, "command unschedule");

    let mut board = mount(store, ctx, MonthRef::of(ctx.today)).await?;
    let event = board.handle(Gesture::Unschedule(id.clone()));
    ctx.renderer.print_event(&event)?;

    let failures = finish(&mut board, &ctx.renderer).await?;
    if !matches!(event, BoardEvent::Unscheduled { .. }) {
        bail!("unschedule {id}: {}", describe_event(&event));
    }
    if failures > 0 {
        bail!("unschedule {id}: the order store did not accept the change");
    }
    Ok(())
}

/// One line of the interactive board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    Gesture(Gesture),
    Next,
    Prev,
    Goto(MonthRef),
    Close,
    Open(OrderId),
    Pool,
    Show,
    Help,
    Quit,
}

/// Parses a board line. Days may be written as `YYYY-MM-DD`, `today`, or a
/// bare day number of the displayed month; `-` stands for a filler cell.
pub fn parse_board_line(
    line: &str,
    month: MonthRef,
    today: NaiveDate,
) -> anyhow::Result<Option<BoardCommand>> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };
    let arg = tokens.next();
    let need = |what: &str| anyhow!("{head}: missing {what}");

    let command = match head.to_ascii_lowercase().as_str() {
        "drag" => BoardCommand::Gesture(Gesture::DragStart(OrderId::new(
            arg.ok_or_else(|| need("order id"))?,
        ))),
        "release" => BoardCommand::Gesture(Gesture::DragEnd),
        "drop" => BoardCommand::Gesture(Gesture::Drop(parse_cell(
            arg.ok_or_else(|| need("day"))?,
            month,
            today,
        )?)),
        "click" => BoardCommand::Gesture(Gesture::Click(parse_cell(
            arg.ok_or_else(|| need("day"))?,
            month,
            today,
        )?)),
        "cancel" => BoardCommand::Gesture(Gesture::Cancel),
        "unschedule" => BoardCommand::Gesture(Gesture::Unschedule(OrderId::new(
            arg.ok_or_else(|| need("order id"))?,
        ))),
        "next" => BoardCommand::Next,
        "prev" | "previous" => BoardCommand::Prev,
        "month" | "goto" => BoardCommand::Goto(MonthRef::parse(arg.unwrap_or(""), today)?),
        "close" => BoardCommand::Close,
        "open" => BoardCommand::Open(OrderId::new(arg.ok_or_else(|| need("order id"))?)),
        "pool" => BoardCommand::Pool,
        "show" => BoardCommand::Show,
        "help" | "?" => BoardCommand::Help,
        "quit" | "exit" | "q" => BoardCommand::Quit,
        other => bail!("unknown board command: {other} (type `help`)"),
    };
    Ok(Some(command))
}

fn parse_cell(token: &str, month: MonthRef, today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    if token == "-" {
        return Ok(None);
    }

    if token.len() <= 2 && token.chars().all(|ch| ch.is_ascii_digit()) {
        let number: u32 = token.parse().with_context(|| format!("invalid day {token:?}"))?;
        let day = month
            .first_day()
            .with_day(number)
            .ok_or_else(|| anyhow!("{month} has no day {number}"))?;
        return Ok(Some(day));
    }

    parse_day(token, today).map(Some)
}

const BOARD_HELP: &str = "\
gestures:   drag <id> | drop <day|-> | release | click <day|-> | cancel | unschedule <id>
navigation: next | prev | month <YYYY-MM> | show | pool | open <id> | close | quit";

async fn cmd_board<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
    args: &[String],
) -> anyhow::Result<()> {
    let month = month_arg(args, ctx.today)?;
    info!(%month, role = %ctx.viewer.role, "command board");

    let mut board = Board::mount(store, ctx.viewer.clone(), month, ctx.today).await;
    let renderer = &ctx.renderer;
    for event in board.drain_events() {
        renderer.print_sync_event(&event)?;
    }
    if !board.viewer().can_schedule() {
        println!("read-only: role {} may not change the schedule", board.viewer().role);
    }
    renderer.print_month(&board.grid(), board.range_state(), board.today())?;

    let interactive = io::stdin().is_terminal();
    let mut lines = io::stdin().lock().lines();
    loop {
        if interactive {
            print!("{}> ", board.month());
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed reading board input")?;

        let command = match parse_board_line(&line, board.month(), board.today()) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };
        debug!(?command, "board command");

        match command {
            BoardCommand::Gesture(gesture) => {
                let event = board.handle(gesture);
                renderer.print_event(&event)?;
                match event {
                    BoardEvent::DayDetailOpened(_) => {
                        if let Some(detail) = board.day_detail() {
                            renderer.print_day_detail(&detail)?;
                        }
                    }
                    BoardEvent::RangeStarted { .. }
                    | BoardEvent::RangeCommitted { .. }
                    | BoardEvent::Unscheduled { .. } => {
                        renderer.print_month(&board.grid(), board.range_state(), board.today())?;
                    }
                    _ => {}
                }
            }
            BoardCommand::Next => {
                board.next_month();
                renderer.print_month(&board.grid(), board.range_state(), board.today())?;
            }
            BoardCommand::Prev => {
                board.previous_month();
                renderer.print_month(&board.grid(), board.range_state(), board.today())?;
            }
            BoardCommand::Goto(month) => {
                board.show_month(month);
                renderer.print_month(&board.grid(), board.range_state(), board.today())?;
            }
            BoardCommand::Close => {
                if !board.close_day_detail() {
                    println!("no day detail is open");
                }
            }
            BoardCommand::Open(id) => {
                if let Err(err) = board.open_order(&id, &PrintNavigator { renderer }) {
                    println!("{err}");
                }
            }
            BoardCommand::Pool => renderer.print_pool(&board.pool())?,
            BoardCommand::Show => {
                renderer.print_month(&board.grid(), board.range_state(), board.today())?;
                if let Some(detail) = board.day_detail() {
                    println!();
                    renderer.print_day_detail(&detail)?;
                }
            }
            BoardCommand::Help => println!("{BOARD_HELP}"),
            BoardCommand::Quit => break,
        }

        for event in board.drain_events() {
            renderer.print_sync_event(&event)?;
        }
    }

    drop(lines);

    if let Some(order_id) = board.range_state().pending_order() {
        info!(
            order_id = %order_id,
            "leaving board with a pending range; single-day placement kept"
        );
    }
    let failures = finish(&mut board, renderer).await?;
    info!(failures, "board session closed");
    Ok(())
}

fn cmd_import(ctx: &CommandContext, args: &[String]) -> anyhow::Result<()> {
    info!("command import");
    if ctx.backend != StoreBackend::File {
        bail!(
            "import only works with the file backend (store.backend = {})",
            ctx.backend.as_str()
        );
    }

    let raw = match args.first().map(String::as_str) {
        None | Some("-") => {
            let mut stdin = String::new();
            io::stdin()
                .read_to_string(&mut stdin)
                .context("failed reading stdin")?;
            stdin
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?,
    };

    let orders = parse_import_items(&raw)?;
    if orders.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let store = FileOrderStore::open(&ctx.data_dir)?;
    let (added, replaced) = store.import(orders)?;
    println!("Imported {added} new and {replaced} updated orders.");
    Ok(())
}

async fn cmd_export<S: OrderStore + 'static>(
    store: Arc<S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    info!("command export");
    let board = mount(store, ctx, MonthRef::of(ctx.today)).await?;
    println!("{}", export_json(&board.orders())?);
    Ok(())
}

/// Orders in the order-service wire shape; `import` reads this back.
pub fn export_json(orders: &[Order]) -> anyhow::Result<String> {
    let dtos: Vec<OrderDto> = orders.iter().map(order_to_dto).collect();
    serde_json::to_string(&dtos).context("failed to serialize orders")
}

fn cmd_help() -> anyhow::Result<()> {
    println!("Commands:");
    println!("  month [YYYY-MM]   day <date>   pool   list   info <id>   export");
    println!("  schedule <id> <start> [end]   unschedule <id>   board [YYYY-MM]");
    println!("  import [file]   help   version");
    println!("{BOARD_HELP}");
    Ok(())
}
