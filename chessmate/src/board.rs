// Position decoding: FEN placement field to a typed 8x8 grid.
//
// The authority sends complete positions as FEN strings and the client never
// edits them; decoding happens on every render. The decoder is pure, so a
// bad position is a hard error rather than a partially filled grid.

use std::fmt;

use thiserror::Error;

/// The standard starting position.
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A position string that cannot be decoded into an 8x8 grid.
///
/// Non-retryable: the authority produced it, so resending the request that
/// yielded it cannot help. Callers surface this as a fatal render error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedPosition {
    #[error("empty position string")]
    Empty,

    #[error("expected 8 ranks, found {0}")]
    RankCount(usize),

    #[error("rank {rank} covers {width} squares, expected 8")]
    RankWidth { rank: usize, width: usize },

    #[error("unrecognized piece token `{0}`")]
    UnknownToken(char),
}

// ---------------------------------------------------------------------------
// Pieces and squares
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    /// Parse a single FEN piece letter. Uppercase is white, lowercase black.
    pub fn from_fen_char(c: char) -> Option<Piece> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some(Piece { color, kind })
    }

    /// The FEN letter for this piece.
    pub fn fen_char(&self) -> char {
        let c = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Unicode chess glyph for terminal display.
    pub fn glyph(&self) -> char {
        match (self.color, self.kind) {
            (Color::White, PieceKind::King) => '\u{2654}',
            (Color::White, PieceKind::Queen) => '\u{2655}',
            (Color::White, PieceKind::Rook) => '\u{2656}',
            (Color::White, PieceKind::Bishop) => '\u{2657}',
            (Color::White, PieceKind::Knight) => '\u{2658}',
            (Color::White, PieceKind::Pawn) => '\u{2659}',
            (Color::Black, PieceKind::King) => '\u{265A}',
            (Color::Black, PieceKind::Queen) => '\u{265B}',
            (Color::Black, PieceKind::Rook) => '\u{265C}',
            (Color::Black, PieceKind::Bishop) => '\u{265D}',
            (Color::Black, PieceKind::Knight) => '\u{265E}',
            (Color::Black, PieceKind::Pawn) => '\u{265F}',
        }
    }
}

/// A board square. `file` 0..8 maps to a..h, `rank` 0..8 maps to 1..8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        if file < 8 && rank < 8 {
            Some(Square { file, rank })
        } else {
            None
        }
    }

    /// Parse algebraic notation like `e2`.
    pub fn from_algebraic(s: &str) -> Option<Square> {
        let mut chars = s.chars();
        let file_ch = chars.next()?;
        let rank_ch = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let file = (file_ch as u32).checked_sub('a' as u32)?;
        let rank = rank_ch.to_digit(10)?.checked_sub(1)?;
        Square::new(file as u8, rank as u8)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file) as char;
        write!(f, "{}{}", file, self.rank + 1)
    }
}

// ---------------------------------------------------------------------------
// BoardGrid
// ---------------------------------------------------------------------------

/// A decoded position: rank-major 8x8 grid, a8 at `[0][0]`, h1 at `[7][7]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardGrid {
    squares: [[Option<Piece>; 8]; 8],
}

impl BoardGrid {
    /// Decode the placement field of a FEN string.
    ///
    /// Accepts a full FEN (`... w KQkq - 0 1`) or just the placement field;
    /// everything after the first whitespace is ignored. Each of the 8 rank
    /// groups must expand to exactly 8 squares: a digit token stands for that
    /// many empty squares, any other recognized letter is one piece.
    pub fn decode(fen: &str) -> Result<BoardGrid, MalformedPosition> {
        let placement = fen
            .split_whitespace()
            .next()
            .ok_or(MalformedPosition::Empty)?;

        let groups: Vec<&str> = placement.split('/').collect();
        if groups.len() != 8 {
            return Err(MalformedPosition::RankCount(groups.len()));
        }

        let mut squares = [[None; 8]; 8];
        for (row, group) in groups.iter().enumerate() {
            let mut expanded: Vec<Option<Piece>> = Vec::with_capacity(8);
            for c in group.chars() {
                if let Some(n) = c.to_digit(10) {
                    expanded.extend(std::iter::repeat(None).take(n as usize));
                } else {
                    let piece = Piece::from_fen_char(c)
                        .ok_or(MalformedPosition::UnknownToken(c))?;
                    expanded.push(Some(piece));
                }
            }
            if expanded.len() != 8 {
                return Err(MalformedPosition::RankWidth {
                    rank: row,
                    width: expanded.len(),
                });
            }
            for (col, piece) in expanded.into_iter().enumerate() {
                squares[row][col] = piece;
            }
        }

        Ok(BoardGrid { squares })
    }

    /// The piece on `sq`, if any.
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[(7 - sq.rank) as usize][sq.file as usize]
    }

    /// Rank-major rows for rendering, a8 first.
    pub fn rows(&self) -> &[[Option<Piece>; 8]; 8] {
        &self.squares
    }

    /// Re-encode the placement field. Decoding a valid position and encoding
    /// it again yields the original placement.
    pub fn placement(&self) -> String {
        let mut out = String::new();
        for (row, rank) in self.squares.iter().enumerate() {
            if row > 0 {
                out.push('/');
            }
            let mut empty_run = 0u32;
            for square in rank {
                match square {
                    Some(piece) => {
                        if empty_run > 0 {
                            out.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        out.push(piece.fen_char());
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                out.push_str(&empty_run.to_string());
            }
        }
        out
    }
}
