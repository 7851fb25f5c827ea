//! Routing of physics contacts to feeding or perception.

use thiserror::Error;

use crate::food::FoodKey;
use crate::goopie::GoopieKey;
use crate::physics::{Category, Contact, Participant, PhysicsWorld};
use crate::vision::Channel;

/// Domain object a physics shape belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Goopie(GoopieKey),
    Food(FoodKey),
    /// Index into the arena's wall list.
    Wall(usize),
}

/// Category pairs the arena asks the physics world to report.
pub const ROUTES: [(Category, Category); 4] = [
    (Category::GoopieBody, Category::FoodBody),
    (Category::GoopieSensor, Category::FoodBody),
    (Category::GoopieSensor, Category::GoopieBody),
    (Category::GoopieSensor, Category::WallBody),
];

/// What a contact means for the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Feed { goopie: GoopieKey, food: FoodKey },
    Sense { goopie: GoopieKey, target: Owner, channel: Channel },
}

/// A contact that does not fit the routing table. Any of these means the category setup
/// is broken, and continuing would corrupt perception.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("no route for contact between {0:?} and {1:?}")]
    Unrouted(Category, Category),
    #[error("{category:?} shape is owned by {owner:?}")]
    OwnerMismatch { category: Category, owner: Owner },
}

pub fn register_routes(world: &mut PhysicsWorld<Owner>) {
    for (a, b) in ROUTES {
        world.register_pair(a, b);
    }
}

fn goopie_of(participant: &Participant<Owner>) -> Result<GoopieKey, DispatchError> {
    match participant.owner {
        Owner::Goopie(key) => Ok(key),
        owner => Err(DispatchError::OwnerMismatch {
            category: participant.category,
            owner,
        }),
    }
}

fn food_of(participant: &Participant<Owner>) -> Result<FoodKey, DispatchError> {
    match participant.owner {
        Owner::Food(key) => Ok(key),
        owner => Err(DispatchError::OwnerMismatch {
            category: participant.category,
            owner,
        }),
    }
}

fn route(
    a: &Participant<Owner>,
    b: &Participant<Owner>,
) -> Option<Result<Interaction, DispatchError>> {
    let channel = match (a.category, b.category) {
        (Category::GoopieBody, Category::FoodBody) => {
            return Some(goopie_of(a).and_then(|goopie| {
                food_of(b).map(|food| Interaction::Feed { goopie, food })
            }));
        }
        (Category::GoopieSensor, Category::FoodBody) => Channel::Food,
        (Category::GoopieSensor, Category::GoopieBody) => Channel::Goopie,
        (Category::GoopieSensor, Category::WallBody) => Channel::Wall,
        _ => return None,
    };

    let target = match (channel, b.owner) {
        (Channel::Food, Owner::Food(_))
        | (Channel::Goopie, Owner::Goopie(_))
        | (Channel::Wall, Owner::Wall(_)) => b.owner,
        (_, owner) => {
            return Some(Err(DispatchError::OwnerMismatch {
                category: b.category,
                owner,
            }));
        }
    };
    Some(goopie_of(a).map(|goopie| Interaction::Sense {
        goopie,
        target,
        channel,
    }))
}

/// Classify a contact regardless of which side the physics world put first.
pub fn classify(contact: &Contact<Owner>) -> Result<Interaction, DispatchError> {
    route(&contact.first, &contact.second)
        .or_else(|| route(&contact.second, &contact.first))
        .unwrap_or(Err(DispatchError::Unrouted(
            contact.first.category,
            contact.second.category,
        )))
}
