//! Scoreboard rendering.
//!
//! The board is a header line plus a fixed number of sections, each covering
//! a contiguous run of positions laid out in a five column grid. A single
//! grid of all 151 entries does not fit in one chat message, so the renderer
//! only ever produces sections; [`GridFrame::combined`] glues them together
//! when one blob is wanted.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use super::error::{GameError, Result as GameResult};
use crate::catalog::{Catalog, Position};

pub const GRID_COLUMNS: usize = 5;
pub const CELL_WIDTH: usize = 14;
pub const NAME_WIDTH: usize = 9;
pub const SEPARATOR_WIDTH: usize = 50;
pub const MISSED_MARKER: char = '*';

/// Pushed in place of a section that could not be displayed.
pub const SECTION_PLACEHOLDER: &str = "Grid segment - Too large to display";
/// Sent in place of an initial section the transport refused.
pub const EMPTY_SECTION_PLACEHOLDER: &str = "Grid segment - No Pokémon guessed yet";

#[derive(Debug, Clone, Copy)]
pub enum GridView<'a> {
    Playing { time_left: Duration },
    Final { missed: &'a BTreeMap<Position, String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFrame {
    pub header: String,
    pub sections: Vec<String>,
}

impl GridFrame {
    pub fn render(
        catalog: &Catalog,
        guessed: &BTreeMap<Position, String>,
        view: GridView<'_>,
        section_count: usize,
    ) -> Self {
        let header = render_header(guessed.len(), catalog.len(), view);
        let missed = match view {
            GridView::Playing { .. } => None,
            GridView::Final { missed } => Some(missed),
        };
        let sections = section_ranges(catalog.len(), section_count)
            .into_iter()
            .map(|range| render_section(catalog, range, guessed, missed))
            .collect();
        Self { header, sections }
    }

    pub fn combined(&self) -> String {
        let mut out = self.header.clone();
        for section in &self.sections {
            out.push('\n');
            out.push_str(section);
        }
        out
    }
}

pub fn render_header(guessed_count: usize, total: usize, view: GridView<'_>) -> String {
    let status = match view {
        GridView::Playing { time_left } => format_time(time_left),
        GridView::Final { .. } => "Time's up!".to_string(),
    };
    format!(
        "{guessed_count}/{total}  |  {status}\n{}",
        "=".repeat(SEPARATOR_WIDTH)
    )
}

/// `mm:ss`, rounded down.
pub fn format_time(time_left: Duration) -> String {
    let secs = time_left.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn per_section(total: usize, section_count: usize) -> usize {
    total.div_ceil(section_count.max(1)).max(1)
}

/// Position ranges of each section. Trailing sections are empty when there
/// are more sections than positions to fill them.
pub fn section_ranges(total: usize, section_count: usize) -> Vec<RangeInclusive<Position>> {
    let per = per_section(total, section_count);
    (0..section_count.max(1))
        .map(|section| {
            let start = section * per + 1;
            let end = ((section + 1) * per).min(total);
            (start as Position)..=(end as Position)
        })
        .collect()
}

pub fn section_index(total: usize, section_count: usize, position: Position) -> Option<usize> {
    let position = position as usize;
    if position == 0 || position > total {
        return None;
    }
    Some((position - 1) / per_section(total, section_count))
}

fn truncated(name: &str) -> String {
    name.chars().take(NAME_WIDTH).collect()
}

fn render_cell(
    catalog: &Catalog,
    position: Position,
    guessed: &BTreeMap<Position, String>,
    missed: Option<&BTreeMap<Position, String>>,
) -> String {
    if let Some(name) = guessed.get(&position) {
        return format!("{position:>3}.{}", truncated(name));
    }
    match missed.and_then(|missed| missed.get(&position)) {
        Some(name) => format!("{MISSED_MARKER}{position:>2}.{}", truncated(name)),
        None => {
            // Final frames for positions absent from `missed` still get their
            // true name when the catalog knows it.
            if missed.is_some()
                && let Some(entry) = catalog.get(position)
            {
                return format!("{MISSED_MARKER}{position:>2}.{}", truncated(&entry.name));
            }
            format!("{position:>3}.")
        }
    }
}

/// Renders one section, column-major: positions run down a column before
/// moving right.
pub fn render_section(
    catalog: &Catalog,
    range: RangeInclusive<Position>,
    guessed: &BTreeMap<Position, String>,
    missed: Option<&BTreeMap<Position, String>>,
) -> String {
    let (start, end) = (*range.start() as usize, *range.end() as usize);
    if start > end {
        return String::new();
    }
    let items = end - start + 1;
    let rows = items.div_ceil(GRID_COLUMNS);

    let mut lines = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut line = String::with_capacity(GRID_COLUMNS * CELL_WIDTH);
        for col in 0..GRID_COLUMNS {
            let position = start + row + col * rows;
            if position > end {
                continue;
            }
            let cell = render_cell(catalog, position as Position, guessed, missed);
            line.push_str(&format!("{cell:<CELL_WIDTH$}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Wraps a block in a code fence so the transport keeps it monospaced.
pub fn fenced(text: &str) -> String {
    format!("```\n{text}\n```")
}

/// Errors with [`GameError::RenderOverflow`] when a fenced block is larger
/// than the transport accepts.
pub fn check_fits(section: usize, block: &str, max_len: usize) -> GameResult<()> {
    let len = block.chars().count();
    if len > max_len {
        return Err(GameError::RenderOverflow {
            section,
            len,
            max: max_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::original_151().unwrap()
    }

    fn guessed_of(catalog: &Catalog, positions: &[Position]) -> BTreeMap<Position, String> {
        positions
            .iter()
            .map(|&p| (p, catalog.get(p).unwrap().name.clone()))
            .collect()
    }

    #[test]
    fn header_during_play_and_at_the_end() {
        let playing = render_header(
            1,
            151,
            GridView::Playing {
                time_left: Duration::from_secs(14 * 60 + 7),
            },
        );
        assert_eq!(playing, format!("1/151  |  14:07\n{}", "=".repeat(50)));

        let missed = BTreeMap::new();
        let done = render_header(140, 151, GridView::Final { missed: &missed });
        assert!(done.starts_with("140/151  |  Time's up!\n"));
    }

    #[test]
    fn time_is_rounded_down() {
        assert_eq!(format_time(Duration::from_secs(900)), "15:00");
        assert_eq!(format_time(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_time(Duration::ZERO), "00:00");
    }

    #[test]
    fn sections_partition_all_positions_for_any_count() {
        for section_count in 1..=200 {
            let ranges = section_ranges(151, section_count);
            assert_eq!(ranges.len(), section_count);
            let covered: Vec<usize> = ranges
                .iter()
                .flat_map(|r| r.clone())
                .map(|p| p as usize)
                .collect();
            assert_eq!(
                covered,
                (1..=151).collect::<Vec<_>>(),
                "section count {section_count}"
            );
        }
    }

    #[test]
    fn section_index_agrees_with_ranges() {
        for section_count in [1, 3, 4, 7, 151] {
            let ranges = section_ranges(151, section_count);
            for position in 1..=151 {
                let idx = section_index(151, section_count, position).unwrap();
                assert!(ranges[idx].contains(&position));
            }
        }
        assert_eq!(section_index(151, 4, 0), None);
        assert_eq!(section_index(151, 4, 152), None);
    }

    #[test]
    fn cells_run_down_columns_first() {
        let catalog = catalog();
        let guessed = guessed_of(&catalog, &[1, 9, 38]);
        let section = render_section(&catalog, 1..=38, &guessed, None);
        let lines: Vec<&str> = section.lines().collect();

        // 38 entries over 5 columns: 8 rows, so column 2 starts at 9.
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("  1.Bulbasaur"));
        assert_eq!(&lines[0][CELL_WIDTH..2 * CELL_WIDTH], "  9.Blastoise ");
        assert!(lines[1].starts_with("  2.          "));
        assert!(lines[5].contains(" 38.Ninetales"));
        assert!(!lines[6].contains(" 38."));
    }

    #[test]
    fn long_names_are_truncated() {
        let catalog = catalog();
        let guessed = guessed_of(&catalog, &[5]);
        let section = render_section(&catalog, 1..=38, &guessed, None);
        assert!(section.contains("  5.Charmeleo "));
        assert!(!section.contains("Charmeleon"));
    }

    #[test]
    fn final_frame_marks_misses_with_their_names() {
        let catalog = catalog();
        let guessed = guessed_of(&catalog, &[1, 2]);
        let missed: BTreeMap<Position, String> = catalog
            .entries()
            .iter()
            .filter(|e| !guessed.contains_key(&e.position))
            .map(|e| (e.position, e.name.clone()))
            .collect();

        let frame = GridFrame::render(&catalog, &guessed, GridView::Final { missed: &missed }, 4);
        assert!(frame.header.starts_with("2/151  |  Time's up!"));
        assert!(frame.sections[0].contains("  1.Bulbasaur"));
        assert!(frame.sections[0].contains("* 3.Venusaur"));
        assert!(frame.sections[3].contains("*151.Mew"));
        let markers: usize = frame
            .sections
            .iter()
            .map(|s| s.matches(MISSED_MARKER).count())
            .sum();
        assert_eq!(markers, 149);
    }

    #[test]
    fn rendering_is_deterministic() {
        let catalog = catalog();
        let guessed = guessed_of(&catalog, &[4, 25, 150]);
        let view = GridView::Playing {
            time_left: Duration::from_secs(321),
        };
        let a = GridFrame::render(&catalog, &guessed, view, 4);
        let b = GridFrame::render(&catalog, &guessed, view, 4);
        assert_eq!(a, b);
        assert_eq!(a.combined(), b.combined());
    }

    #[test]
    fn combined_view_is_header_plus_sections() {
        let catalog = catalog();
        let guessed = BTreeMap::new();
        let frame = GridFrame::render(
            &catalog,
            &guessed,
            GridView::Playing {
                time_left: Duration::from_secs(900),
            },
            4,
        );
        let expected = format!("{}\n{}", frame.header, frame.sections.join("\n"));
        assert_eq!(frame.combined(), expected);
    }

    #[test]
    fn four_sections_fit_a_chat_message_but_one_does_not() {
        let catalog = catalog();
        let guessed = BTreeMap::new();
        let missed: BTreeMap<Position, String> = catalog
            .entries()
            .iter()
            .map(|e| (e.position, e.name.clone()))
            .collect();
        let view = GridView::Final { missed: &missed };

        let sectioned = GridFrame::render(&catalog, &guessed, view, 4);
        for (idx, section) in sectioned.sections.iter().enumerate() {
            assert!(check_fits(idx, &fenced(section), 2000).is_ok());
        }

        let monolithic = GridFrame::render(&catalog, &guessed, view, 1);
        assert!(matches!(
            check_fits(0, &fenced(&monolithic.sections[0]), 2000),
            Err(GameError::RenderOverflow { section: 0, max: 2000, .. })
        ));
    }

    #[test]
    fn surplus_sections_render_empty() {
        let catalog = Catalog::from_names(["Abra", "Kadabra", "Alakazam"]).unwrap();
        let frame = GridFrame::render(
            &catalog,
            &BTreeMap::new(),
            GridView::Playing {
                time_left: Duration::from_secs(1),
            },
            5,
        );
        assert_eq!(frame.sections.len(), 5);
        assert_eq!(frame.sections[0], format!("{:<14}", "  1."));
        assert!(frame.sections[3].is_empty());
        assert!(frame.sections[4].is_empty());
    }
}
