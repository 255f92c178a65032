//! Built-in demo exercise, used whenever a request omits its own quiz or
//! context. Content is the product's guided example (Spanish).

use crate::model::QuizItem;

pub const DEFAULT_TOPIC: &str = "Guillermo Treister";

pub const DEFAULT_CONTEXT: &str = "Perfil extenso: Guillermo Treister

Formación académica
Guillermo Treister es Ingeniero Civil en Informática por la Universidad de Chile y cuenta con un Diploma en Gestión de Negocios otorgado por la Universidad Adolfo Ibáñez.

Trayectoria profesional
Actualmente ocupa el cargo de Latin America Watson AI Apps Executive en IBM, liderando soluciones de IA en LATAM. También ha sido Gerente Técnico Cloud en IBM Chile.

Visión y enfoque sobre la IA
Ética y responsabilidad: insiste en IA gobernable, explicable y confiable.
IA generativa: destaca su carácter disruptivo para crear contenido.
Democratización tecnológica: uso por no especialistas.
";

pub const DEFAULT_LINKS: &[&str] = &[
    "https://latam.tivit.com/prensa/descubriendo-su-potencial-en-el-mundo-de-los-negocios",
    "https://itbuilderslive.com/2023/personas/guillermo-treister/",
    "https://txsplus.com/2022/06/guillermo-treister-latin-america-watson-ai-apps-executive-de-ibm-entrega-las-claves-sobre-la-importancia-de-la-ia-etica/",
];

pub fn default_quiz() -> Vec<QuizItem> {
    let item = |question: &str| QuizItem {
        question: question.to_string(),
        ideal_answer: "Guillermo Treister.".to_string(),
    };
    vec![
        item(
            "¿Quién es el Ingeniero Civil en Informática por la Universidad de Chile y diplomado en Gestión de Negocios por la Universidad Adolfo Ibáñez?",
        ),
        item(
            "¿Quién actualmente lidera como Latin America Watson AI Apps Executive en IBM y ha sido Gerente Técnico Cloud en IBM Chile?",
        ),
        item(
            "¿Quién ha defendido que la IA debe ser gobernable, explicable y confiable, destacando la necesidad de vigilancia continua para evitar sesgos?",
        ),
        item(
            "¿Quién define la IA generativa como disruptiva por su velocidad y coherencia para crear contenido, y aboga por su democratización?",
        ),
    ]
}
