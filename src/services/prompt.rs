//! Prompt text sent to the text and image models.
//!
//! Only formats strings. No networking and no parsing happen here.

use serde_json::{Value, json};

use crate::models::Tone;

/// Instruction asking the text model for a titled story of exactly `num_pages` pages.
pub fn story_prompt(idea: &str, tone: Tone, num_pages: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "Eres un maestro narrador y director de arte para juegos de rol retro de pixel-art.\n",
    );
    prompt.push_str(&format!(
        "Basado en la siguiente idea, crea un cuento corto ilustrado con un tono de {}.\n",
        tone.descriptor()
    ));
    prompt.push_str(&format!(
        "La historia debe tener un título, una imagen de portada y dividirse en exactamente {} páginas. \
         Todo debe estar completamente en español.\n",
        num_pages
    ));
    prompt.push_str(
        "Para cada página, proporciona el texto de la historia y un aviso de imagen (imagePrompt) puramente visual.\n\n",
    );

    prompt.push_str("**Instrucciones cruciales para 'imagePrompt':**\n");
    prompt.push_str(
        "1. **Solo visual:** describe ÚNICAMENTE elementos visuales (personajes, escenarios, acciones, colores, atmósfera).\n",
    );
    prompt.push_str(
        "2. **Sin texto:** NO pidas texto, letras, carteles ni ningún tipo de tipografía en la imagen.\n",
    );
    prompt.push_str(
        "3. **Consistencia:** mantén el mismo estilo y los mismos personajes en todos los prompts \
         (ej: \"El mismo caballero con armadura plateada...\").\n\n",
    );

    prompt.push_str(&format!("Idea: \"{}\"\n\n", idea.trim()));

    prompt.push_str("Devuelve el resultado como un único objeto JSON.\n");
    prompt.push_str(
        "Ejemplo de un buen imagePrompt: \"Un majestuoso castillo de pixel art bajo un cielo nocturno estrellado, \
         un caballero solitario en el puente levadizo. Estilo RPG de fantasía de 16 bits, paleta de colores sombría.\"\n",
    );

    prompt
}

/// Response schema in the Gemini `responseSchema` dialect.
pub fn story_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "Un título creativo y evocador para la historia, en español."
            },
            "coverImagePrompt": {
                "type": "STRING",
                "description": "Un aviso puramente visual para una portada épica de pixel art. \
                                Sin el título ni ningún otro texto. Resume visualmente el tono de la historia."
            },
            "pages": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": {
                            "type": "STRING",
                            "description": "El texto de esta página, cautivador y en español."
                        },
                        "imagePrompt": {
                            "type": "STRING",
                            "description": "Un aviso puramente visual para una imagen de pixel art de la escena. \
                                            Sin texto ni letras. Solo acción, personajes y entorno, \
                                            en un estilo coherente de RPG de fantasía de 16 bits."
                        }
                    },
                    "required": ["text", "imagePrompt"]
                }
            }
        },
        "required": ["title", "coverImagePrompt", "pages"]
    })
}

/// Wraps a purely visual prompt with the fixed art direction.
pub fn image_prompt(visual: &str) -> String {
    format!(
        "Ilustración de pixel art detallada de: \"{}\". \
         Estilo visual consistente con los JRPG de la era SNES (como Chrono Trigger o Secret of Mana), \
         paleta de colores rica y cálida, fondos vibrantes. La composición debe ser cinematográfica. \
         **Instrucción crítica e inviolable: LA IMAGEN FINAL NO DEBE CONTENER, BAJO NINGUNA CIRCUNSTANCIA, \
         NINGÚN TIPO DE TEXTO, LETRAS, NÚMEROS, INTERFAZ DE USUARIO, LOGOTIPOS O SÍMBOLOS ESCRITOS. \
         Debe ser una escena puramente visual y pictórica.**",
        visual.trim()
    )
}
