//! Achievement catalog and unlock evaluation

use super::progress::LearningStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unlocked achievement as shown to the child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
    /// Whether the unlock celebration has been displayed
    pub shown: bool,
}

/// Static description of an achievement and the rule that unlocks it
pub struct AchievementDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    predicate: fn(&LearningStats) -> bool,
}

impl AchievementDefinition {
    pub fn is_satisfied(&self, stats: &LearningStats) -> bool {
        (self.predicate)(stats)
    }

    /// Fresh, not-yet-shown achievement record
    pub fn unlock(&self, at: DateTime<Utc>) -> Achievement {
        Achievement {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            unlocked_at: at,
            shown: false,
        }
    }
}

pub static CATALOG: [AchievementDefinition; 8] = [
    AchievementDefinition {
        id: "first-correct",
        name: "第一次答对！",
        description: "答对了第一道题",
        icon: "🌟",
        predicate: |s| s.correct_answers >= 1,
    },
    AchievementDefinition {
        id: "streak-3",
        name: "三连胜！",
        description: "连续答对 3 道题",
        icon: "🔥",
        predicate: |s| s.current_streak >= 3,
    },
    AchievementDefinition {
        id: "streak-5",
        name: "五连胜！",
        description: "连续答对 5 道题",
        icon: "⚡",
        predicate: |s| s.current_streak >= 5,
    },
    AchievementDefinition {
        id: "streak-10",
        name: "十连胜王者！",
        description: "连续答对 10 道题",
        icon: "👑",
        predicate: |s| s.current_streak >= 10,
    },
    AchievementDefinition {
        id: "accuracy-80",
        name: "优秀学员",
        description: "正确率达到 80%（至少 5 题）",
        icon: "🎯",
        predicate: |s| s.accuracy >= 80.0 && s.total_questions >= 5,
    },
    AchievementDefinition {
        id: "accuracy-90",
        name: "学习之星",
        description: "正确率达到 90%（至少 10 题）",
        icon: "🏆",
        predicate: |s| s.accuracy >= 90.0 && s.total_questions >= 10,
    },
    AchievementDefinition {
        id: "questions-10",
        name: "勤奋学习",
        description: "完成 10 道题",
        icon: "📚",
        predicate: |s| s.total_questions >= 10,
    },
    AchievementDefinition {
        id: "questions-50",
        name: "学习达人",
        description: "完成 50 道题",
        icon: "🎓",
        predicate: |s| s.total_questions >= 50,
    },
];

/// Look up a catalog entry by id
pub fn definition(id: &str) -> Option<&'static AchievementDefinition> {
    CATALOG.iter().find(|d| d.id == id)
}

/// Achievements satisfied by `stats` that are not in `unlocked`, in catalog order
pub fn evaluate(stats: &LearningStats, unlocked: &[String]) -> Vec<&'static AchievementDefinition> {
    CATALOG
        .iter()
        .filter(|d| !unlocked.iter().any(|id| id == d.id))
        .filter(|d| d.is_satisfied(stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(correct: u32, incorrect: u32, streak: u32) -> LearningStats {
        let total = correct + incorrect;
        LearningStats {
            total_questions: total,
            correct_answers: correct,
            incorrect_answers: incorrect,
            accuracy: if total == 0 {
                0.0
            } else {
                correct as f64 / total as f64 * 100.0
            },
            current_streak: streak,
            longest_streak: streak,
            ..Default::default()
        }
    }

    fn ids(defs: &[&AchievementDefinition]) -> Vec<&'static str> {
        defs.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_catalog_ids_unique() {
        let mut ids: Vec<_> = CATALOG.iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn test_empty_stats_unlock_nothing() {
        assert!(evaluate(&LearningStats::default(), &[]).is_empty());
    }

    #[test]
    fn test_first_correct() {
        assert_eq!(ids(&evaluate(&stats(1, 0, 1), &[])), ["first-correct"]);
    }

    #[test]
    fn test_single_evaluation_can_unlock_several() {
        let found = ids(&evaluate(&stats(5, 0, 5), &[]));
        assert_eq!(found, ["first-correct", "streak-3", "streak-5", "accuracy-80"]);
    }

    #[test]
    fn test_already_unlocked_are_skipped() {
        let unlocked = vec!["first-correct".to_string(), "streak-3".to_string()];
        let found = ids(&evaluate(&stats(5, 0, 5), &unlocked));
        assert_eq!(found, ["streak-5", "accuracy-80"]);
    }

    #[test]
    fn test_accuracy_gates_on_question_count() {
        assert!(ids(&evaluate(&stats(4, 1, 0), &[])).contains(&"accuracy-80"));

        // High accuracy over too few questions is not enough
        let few = LearningStats {
            accuracy: 100.0,
            ..stats(4, 0, 4)
        };
        assert!(!definition("accuracy-80").unwrap().is_satisfied(&few));

        assert!(definition("accuracy-90").unwrap().is_satisfied(&stats(9, 1, 0)));
        assert!(!definition("accuracy-90").unwrap().is_satisfied(&stats(8, 1, 0)));
    }

    #[test]
    fn test_question_milestones() {
        assert!(definition("questions-10").unwrap().is_satisfied(&stats(0, 10, 0)));
        assert!(!definition("questions-50").unwrap().is_satisfied(&stats(30, 19, 0)));
        assert!(definition("questions-50").unwrap().is_satisfied(&stats(30, 20, 0)));
    }

    #[test]
    fn test_unlock_record() {
        let at = Utc::now();
        let achievement = definition("streak-10").unwrap().unlock(at);
        assert_eq!(achievement.name, "十连胜王者！");
        assert_eq!(achievement.icon, "👑");
        assert_eq!(achievement.unlocked_at, at);
        assert!(!achievement.shown);
    }
}
