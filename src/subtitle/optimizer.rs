//! Модуль для оптимизации субтитров перед синтезом
//!
//! Слишком короткие реплики звучат рвано, поэтому их можно объединить с соседними.

use crate::subtitle::cue::Cue;
use crate::subtitle::parser::renumber;

/// Количество иероглифов CJK в строке
pub fn count_cjk_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c))
        .count()
}

/// Объединить реплики, в которых меньше `min_cjk_chars` иероглифов
///
/// Короткая реплика присоединяется к соседу с меньшим числом иероглифов:
/// первая к следующей, последняя к предыдущей. Окно времени расширяется,
/// после чего субтитры перенумеровываются.
pub fn merge_short_cues(mut cues: Vec<Cue>, min_cjk_chars: usize) -> Vec<Cue> {
    let mut i = 0;
    while i < cues.len() {
        if cues.len() < 2 || count_cjk_chars(&cues[i].text) >= min_cjk_chars {
            i += 1;
            continue;
        }

        let merge_to_prev = if i == 0 {
            false
        } else if i == cues.len() - 1 {
            true
        } else {
            count_cjk_chars(&cues[i - 1].text) <= count_cjk_chars(&cues[i + 1].text)
        };

        let short = cues.remove(i);
        if merge_to_prev {
            let prev = &mut cues[i - 1];
            prev.text = format!("{}\n{}", prev.text, short.text);
            prev.end_time = short.end_time;
            // Перепроверяем объединенную реплику
            i -= 1;
        } else {
            let next = &mut cues[i];
            next.text = format!("{}\n{}", short.text, next.text);
            next.start_time = short.start_time;
        }
    }

    renumber(&mut cues);
    cues
}
