//! Prompt builders for the analysis tasks.
//!
//! All structured tasks ask for strict JSON; the response shapes here
//! mirror what `schema` expects.

/// System prompt for moment selection.
pub const SELECTION_SYSTEM: &str = "Ты — эксперт по вирусному контенту для коротких вертикальных видео. \
Тебе дают транскрипт видео, и ты находишь моменты, которые лучше всего \
сработают как отдельные клипы на 15-60 секунд. Цени сильный хук в первые \
секунды, эмоциональные пики, конфликты, неожиданные повороты и законченные \
мысли. Отвечай строго в формате JSON без пояснений.";

/// System prompt for virality scoring of one candidate clip.
pub const SCORING_SYSTEM: &str = "Ты оцениваешь потенциал короткого клипа стать вирусным. Оцени по \
четырём критериям, каждый от 0 до 25: hook (захват внимания в первые \
секунды), engagement (удержание и вовлечение), flow (темп и связность), \
trend (актуальность темы). Дай 1-3 коротких совета, как улучшить клип. \
Отвечай строго в формате JSON без пояснений.";

/// System prompt for final title generation.
pub const TITLE_SYSTEM: &str = "Ты придумываешь цепляющие заголовки для коротких видео на русском \
языке. Заголовок должен быть не длиннее 60 символов, без кавычек и без \
кликбейт-штампов вроде «шок» и «вы не поверите». Отвечай строго в формате \
JSON без пояснений.";

/// System prompt for call-to-action suggestion.
pub const CTA_SYSTEM: &str = "Ты придумываешь короткий призыв к действию для финала клипа: 3-8 слов, \
не длиннее 50 символов, на русском языке. Укажи позицию показа: \"end\" \
(карточка после клипа) или \"overlay\" (поверх последних секунд), и \
длительность показа в секундах от 3 до 5. Отвечай строго в формате JSON \
без пояснений.";

/// User prompt for moment selection over a (possibly truncated) transcript.
pub fn selection_user(transcript_text: &str, video_duration: f64, max_moments: usize) -> String {
    format!(
        "Длительность видео: {video_duration:.0} секунд.\n\
         Найди до {max_moments} лучших моментов для клипов.\n\n\
         Верни JSON вида:\n\
         {{\"moments\": [{{\"start\": число_секунд, \"end\": число_секунд, \
         \"title\": \"предварительный заголовок\", \"reason\": \"почему этот момент\", \
         \"hook_strength\": число_0_25}}]}}\n\n\
         Транскрипт:\n{transcript_text}"
    )
}

/// User prompt for scoring one moment.
pub fn scoring_user(title: &str, moment_text: &str) -> String {
    format!(
        "Клип: «{title}»\n\n\
         Текст момента:\n{moment_text}\n\n\
         Верни JSON вида:\n\
         {{\"hook\": число, \"engagement\": число, \"flow\": число, \
         \"trend\": число, \"tips\": [\"совет\"]}}"
    )
}

/// User prompt for the final title of one moment.
pub fn title_user(preliminary_title: &str, moment_text: &str) -> String {
    format!(
        "Рабочее название: «{preliminary_title}»\n\n\
         Текст момента:\n{moment_text}\n\n\
         Верни JSON вида: {{\"title\": \"заголовок\"}}"
    )
}

/// User prompt for the CTA of one moment.
pub fn cta_user(title: &str, moment_text: &str) -> String {
    format!(
        "Клип: «{title}»\n\n\
         Текст момента:\n{moment_text}\n\n\
         Верни JSON вида: {{\"text\": \"призыв\", \"position\": \"end\", \
         \"duration\": 4}}"
    )
}
