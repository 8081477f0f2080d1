use std::fmt::Write;

use ori_api::prelude::*;

use crate::{RoundView, UserAction};

/// How a square is drawn, highest precedence first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    /// The revealed winning square.
    Winner,
    /// Eliminated during the draw.
    Faded,
    Selected,
    Hovered,
    Normal,
}

impl CellState {
    fn marker(self) -> char {
        match self {
            CellState::Winner => '*',
            CellState::Faded => '.',
            CellState::Selected => '+',
            CellState::Hovered => '~',
            CellState::Normal => ' ',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellView {
    pub index: u8,
    pub state: CellState,
    /// Miners on this square.
    pub miners: u64,
    pub deployed: Amount,
    /// The user's own stake on this square, local echo included.
    pub mine: Amount,
    pub deployed_label: String,
    /// Clicks are ignored while a draw is on screen.
    pub disabled: bool,
}

impl CellView {
    /// Squares are shown 1-25.
    pub fn label(&self) -> String {
        format!("#{}", self.index + 1)
    }
}

fn cell_state(view: &RoundView, cell: u8, hover: Option<u8>) -> CellState {
    // The winner keeps its normal or selected look until the reveal.
    if view.show_winner && view.winning_cell == Some(cell) {
        CellState::Winner
    } else if view.faded_cells.contains(cell) {
        CellState::Faded
    } else if view.selected_cells.contains(cell) {
        CellState::Selected
    } else if hover == Some(cell) && view.is_idle() {
        CellState::Hovered
    } else {
        CellState::Normal
    }
}

pub fn cells(view: &RoundView, hover: Option<u8>, decimals: u32) -> [CellView; GRID_SIZE] {
    let opts = FormatOptions::default();
    std::array::from_fn(|i| {
        let index = i as u8;
        let (global, user) = view
            .stats
            .as_ref()
            .map(|stats| (stats.global[i], stats.user[i]))
            .unwrap_or_default();
        let echoed = view.cell_amounts.get(&index).copied().unwrap_or_default();
        CellView {
            index,
            state: cell_state(view, index, hover),
            miners: global.count,
            deployed: global.amount,
            mine: user.amount.max(echoed),
            deployed_label: global.amount.format(decimals, opts),
            disabled: !view.is_idle(),
        }
    })
}

/// Hover is the only state the grid keeps; everything else comes from the
/// published [`RoundView`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridView {
    hover: Option<u8>,
}

impl GridView {
    pub fn hover(&mut self, cell: Option<u8>) {
        self.hover = cell.filter(|c| (*c as usize) < GRID_SIZE);
    }

    pub fn hovered(&self) -> Option<u8> {
        self.hover
    }

    pub fn click(&self, view: &RoundView, cell: u8) -> Option<UserAction> {
        (view.is_idle() && (cell as usize) < GRID_SIZE).then_some(UserAction::Toggle(cell))
    }

    pub fn select_all(&self, view: &RoundView) -> Option<UserAction> {
        view.is_idle().then_some(UserAction::ToggleAll)
    }

    pub fn cells(&self, view: &RoundView, decimals: u32) -> [CellView; GRID_SIZE] {
        cells(view, self.hover, decimals)
    }
}

/// Five rows of five squares for terminals.
pub fn render(cells: &[CellView; GRID_SIZE]) -> String {
    let mut out = String::new();
    for row in cells.chunks(5) {
        for cell in row {
            let _ = write!(
                out,
                "[{}{:>3} {:>7}]",
                cell.state.marker(),
                cell.label(),
                cell.deployed_label
            );
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::CellSet;

    use super::*;

    fn drawing_view() -> RoundView {
        RoundView {
            round_id: Some(41),
            winning_cell: Some(7),
            is_drawing: true,
            faded_cells: [0, 1].into_iter().collect(),
            selected_cells: [1, 7, 9].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn unrevealed_winner_keeps_its_look() {
        let view = drawing_view();
        let cells = cells(&view, Some(9), 18);
        assert_eq!(cells[0].state, CellState::Faded);
        // faded wins over selected
        assert_eq!(cells[1].state, CellState::Faded);
        assert_eq!(cells[7].state, CellState::Selected);
        // no hover while drawing
        assert_eq!(cells[9].state, CellState::Selected);
        assert_eq!(cells[12].state, CellState::Normal);
        assert!(cells[12].disabled);
    }

    #[test]
    fn revealed_winner_glows() {
        let mut faded = CellSet::full();
        faded.remove(7);
        let view = RoundView {
            is_drawing: false,
            show_winner: true,
            faded_cells: faded,
            ..drawing_view()
        };
        let cells = cells(&view, None, 18);
        assert_eq!(cells[7].state, CellState::Winner);
        assert_eq!(cells[7].state.marker(), '*');
        assert!(cells.iter().filter(|c| c.index != 7).all(|c| c.state == CellState::Faded));
    }

    #[test]
    fn idle_grid_hover_and_amounts() {
        let mut stats = BetStatistics::empty(41);
        stats.global[3] = CellStat {
            count: 2,
            amount: Amount(1_500_000_000_000_000_000),
        };
        stats.user[3].amount = Amount(1);
        let view = RoundView {
            round_id: Some(41),
            stats: Some(stats),
            cell_amounts: [(3, Amount(5)), (4, Amount(2))].into_iter().collect(),
            ..Default::default()
        };
        let mut grid = GridView::default();
        grid.hover(Some(3));
        let cells = grid.cells(&view, 18);
        assert_eq!(cells[3].state, CellState::Hovered);
        assert_eq!(cells[3].miners, 2);
        assert_eq!(cells[3].deployed_label, "1.5");
        assert_eq!(cells[3].mine, Amount(5));
        assert_eq!(cells[4].mine, Amount(2));
        assert_eq!(cells[24].label(), "#25");

        assert_eq!(grid.click(&view, 3), Some(UserAction::Toggle(3)));
        assert_eq!(grid.click(&drawing_view(), 3), None);
        assert_eq!(grid.select_all(&drawing_view()), None);

        let text = render(&cells);
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("[~ #4     1.5]"));
    }
}
