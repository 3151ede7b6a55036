// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Achievement catalog and per-user grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry. The XP value is supplied by each grant site, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Achievement {
    pub id: Uuid,
    /// Unique; grant sites look achievements up by name
    pub name: String,
    /// Display text describing how to earn it
    pub criterion: String,
}

/// Proof that a user holds an achievement. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub achievement_name: String,
    pub granted_at: DateTime<Utc>,
}

impl UserAchievement {
    pub fn key(user_id: Uuid, achievement_id: Uuid) -> String {
        format!("{}_{}", user_id, achievement_id)
    }
}

/// Achievement names used as lookup keys.
pub mod names {
    pub const FIRST_ACTIVITY: &str = "A Primeira de Muitas";
    pub const ACTIVITY_CREATOR: &str = "Criador de Atividades";
    pub const TEN_SUBSCRIPTIONS: &str = "Está 'Inscrito' nas Estrelas";
    pub const FIRST_APPROVAL: &str = "Dando boas-vindas";
    pub const FIRST_CHECK_IN: &str = "Primeiro Check-in";
    pub const FREQUENT_PARTICIPANT: &str = "Participante Frequente";
    pub const ACTIVITY_CONCLUDED: &str = "Tudo que Começa tem um Fim";
    pub const LEVEL_5: &str = "Nível 5";
    pub const LEVEL_10: &str = "Nível 10";
    /// Meta-achievement for holding five achievements
    pub const ACHIEVEMENT_KING: &str = "Rei das Conquistas";
}

/// XP granted alongside each achievement.
pub mod xp {
    pub const FIRST_ACTIVITY: u64 = 100;
    pub const ACTIVITY_CREATOR: u64 = 200;
    pub const TEN_SUBSCRIPTIONS: u64 = 500;
    pub const FIRST_APPROVAL: u64 = 50;
    pub const FIRST_CHECK_IN: u64 = 100;
    pub const FREQUENT_PARTICIPANT: u64 = 300;
    pub const ACTIVITY_CONCLUDED: u64 = 150;
    pub const LEVEL_5: u64 = 500;
    pub const LEVEL_10: u64 = 1000;
    pub const ACHIEVEMENT_KING: u64 = 100;

    /// Plain XP awards that carry no achievement.
    pub const CHECK_IN_PARTICIPANT: u64 = 50;
    pub const CHECK_IN_CREATOR: u64 = 30;
    pub const CONCLUDE_CREATOR: u64 = 100;
    pub const CONCLUDE_PARTICIPANT: u64 = 50;
}

/// Achievements held before the meta-achievement is granted.
pub const ACHIEVEMENT_KING_THRESHOLD: usize = 5;

/// Default catalog: (name, criterion).
pub const CATALOG: &[(&str, &str)] = &[
    (names::FIRST_ACTIVITY, "Crie sua primeira atividade"),
    (names::ACTIVITY_CREATOR, "Crie 3 atividades"),
    (names::TEN_SUBSCRIPTIONS, "Inscreva-se em 10 atividades"),
    (names::FIRST_APPROVAL, "Aprove um participante pela primeira vez"),
    (names::FIRST_CHECK_IN, "Faça seu primeiro check-in"),
    (names::FREQUENT_PARTICIPANT, "Faça check-in em 5 atividades"),
    (names::ACTIVITY_CONCLUDED, "Conclua uma atividade"),
    (names::LEVEL_5, "Alcance o nível 5"),
    (names::LEVEL_10, "Alcance o nível 10"),
    (names::ACHIEVEMENT_KING, "Conquiste 5 conquistas"),
];
