//! Player identities.
//!
//! `Player` is the absolute seat in the game (who acts first on the street),
//! `Seat` is relative to the re-solving player, which is how every lookahead
//! tensor indexes its player axis. `Perspective` names whose values a
//! collaborator hands back for a given input range.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub fn index(self) -> usize {
        match self {
            Player::P1 => 0,
            Player::P2 => 1,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::P1 => Player::P2,
            Player::P2 => Player::P1,
        }
    }
}

/// Player axis of the lookahead tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    /// The player whose strategy is being re-solved.
    Resolver,
    Opponent,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::Resolver, Seat::Opponent];

    pub fn index(self) -> usize {
        match self {
            Seat::Resolver => 0,
            Seat::Opponent => 1,
        }
    }

    pub fn other(self) -> Seat {
        match self {
            Seat::Resolver => Seat::Opponent,
            Seat::Opponent => Seat::Resolver,
        }
    }

    /// Relative seat of `player` when `resolver` is re-solving.
    pub fn of(player: Player, resolver: Player) -> Seat {
        if player == resolver {
            Seat::Resolver
        } else {
            Seat::Opponent
        }
    }

    /// Absolute player sitting in this seat.
    pub fn player(self, resolver: Player) -> Player {
        match self {
            Seat::Resolver => resolver,
            Seat::Opponent => resolver.opponent(),
        }
    }
}

/// Owner of the values a collaborator computes from one player's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// Values belong to the player holding the input range.
    Holder,
    /// Values belong to the other player, evaluated against the input range.
    Opponent,
}

impl Perspective {
    pub fn owner(self, holder: Seat) -> Seat {
        match self {
            Perspective::Holder => holder,
            Perspective::Opponent => holder.other(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seats_round_trip_through_players() {
        for resolver in [Player::P1, Player::P2] {
            for seat in Seat::BOTH {
                assert_eq!(Seat::of(seat.player(resolver), resolver), seat);
            }
        }
    }

    #[test]
    fn opponent_perspective_flips_owner() {
        assert_eq!(Perspective::Opponent.owner(Seat::Resolver), Seat::Opponent);
        assert_eq!(Perspective::Holder.owner(Seat::Resolver), Seat::Resolver);
    }
}
