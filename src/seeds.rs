//! Built-in exercise content so the bot is useful without any external config.

use crate::domain::{Level, TaskType};

/// Built-in exercise lists. `GetPoints` intentionally has no entries.
pub fn seed_exercises() -> Vec<(Level, TaskType, Vec<&'static str>)> {
  vec![
    // Beginner
    (Level::Beginner, TaskType::TranslateText, vec![
      "Я люблю кошек.",
      "Сегодня солнечно.",
      "Мой брат высокий.",
      "Где находится библиотека?",
    ]),
    (Level::Beginner, TaskType::TranslateWord, vec![
      "apple", "house", "water", "friend", "book", "window",
    ]),
    (Level::Beginner, TaskType::CompleteTranslation, vec![
      "I ___ a student. (Я студент.)",
      "She ___ two cats. (У неё две кошки.)",
      "We ___ from Moscow. (Мы из Москвы.)",
    ]),
    // Intermediate
    (Level::Intermediate, TaskType::TranslateText, vec![
      "Вчера я ходил в кино с друзьями.",
      "Если будет дождь, мы останемся дома.",
      "Она работает в этой компании уже три года.",
    ]),
    (Level::Intermediate, TaskType::TranslateWord, vec![
      "journey", "borrow", "reliable", "schedule", "ancient",
    ]),
    (Level::Intermediate, TaskType::CompleteTranslation, vec![
      "I have ___ been to London. (Я никогда не был в Лондоне.)",
      "He ___ TV when I called. (Он смотрел телевизор, когда я позвонил.)",
      "If I ___ you, I would apologise. (На твоём месте я бы извинился.)",
    ]),
    // Advanced
    (Level::Advanced, TaskType::TranslateText, vec![
      "Несмотря на трудности, проект был завершён в срок.",
      "Чем больше читаешь, тем богаче становится словарный запас.",
      "Его предложение было встречено с осторожным оптимизмом.",
    ]),
    (Level::Advanced, TaskType::TranslateWord, vec![
      "ubiquitous", "meticulous", "to undermine", "feasible", "cumbersome",
    ]),
    (Level::Advanced, TaskType::CompleteTranslation, vec![
      "Had I known, I ___ have helped. (Если бы я знал, я бы помог.)",
      "The report ___ to be finished by Friday. (Отчёт должен быть готов к пятнице.)",
      "Hardly ___ he arrived when it started raining. (Едва он приехал, как пошёл дождь.)",
    ]),
    // Native speaker
    (Level::NativeSpeaker, TaskType::TranslateText, vec![
      "Не было бы счастья, да несчастье помогло.",
      "Он собаку съел в этом деле.",
      "Обещанного три года ждут.",
    ]),
    (Level::NativeSpeaker, TaskType::TranslateWord, vec![
      "serendipity", "to gaslight", "quintessential", "kerfuffle", "sonder",
    ]),
    (Level::NativeSpeaker, TaskType::CompleteTranslation, vec![
      "It's not my cup of ___. (Это не в моём вкусе.)",
      "Don't beat around the ___. (Не ходи вокруг да около.)",
      "He's been ___ the candle at both ends. (Он работает на износ.)",
    ]),
  ]
}
