//! Shader sources shared by the rendering and scene tests

pub const BASIC_VERTEX: &str = "
#version 330 core
layout(location = 0) in vec3 aPos;
uniform mat4 model;
uniform mat4 projViewModel;
void main() { gl_Position = projViewModel * vec4(aPos, 1.0); }
";

pub const BASIC_FRAGMENT: &str = "
#version 330 core
out vec4 fragColor;
void main() { fragColor = vec4(1.0); }
";

pub const PHONG_VERTEX: &str = "
#version 330 core
layout(location = 0) in vec3 aPos;
layout(location = 1) in vec3 aNormal;
layout(location = 2) in vec2 aTexCoord0;
layout(location = 7) in vec4 aWeights;
layout(location = 8) in uvec4 aJoints;

uniform mat4 model;
uniform mat4 projViewModel;
uniform mat3 normalMatrix;
uniform mat4 boneMatrices[4];

out vec3 fragPos;
out vec3 normal;

void main() {
    mat4 skin = mat4(0.0);
    for (int i = 0; i < 4; ++i) skin += aWeights[i] * boneMatrices[aJoints[i]];
    fragPos = vec3(model * skin * vec4(aPos, 1.0));
    normal = normalMatrix * aNormal;
    gl_Position = projViewModel * skin * vec4(aPos, 1.0);
}
";

pub const PHONG_FRAGMENT: &str = "
#version 330 core
struct DirLight {
    vec3 direction;
    vec3 diffuse;
    vec3 ambient;
    vec3 specular;
};

struct PointLight {
    vec3 position;
    vec3 diffuse;
    vec3 ambient;
    vec3 specular;
    float constant;
    float linear;
    float quadratic;
};

uniform DirLight dirLights[2];
uniform PointLight pointLights[4];
uniform int numDirLights;
uniform int numPointLights;
uniform vec3 viewPos;

uniform vec3 diffuseColor;
uniform vec3 specularColor;
uniform vec3 ambientColor;
uniform sampler2D diffuseTex;
uniform sampler2D specularTex;
uniform sampler2D ambientTex;
uniform int diffuseUV;
uniform int specularUV;
uniform int ambientUV;
uniform float shininess;

in vec3 fragPos;
in vec3 normal;
out vec4 fragColor;

void main() { fragColor = vec4(diffuseColor, 1.0); }
";

pub const SCREEN_VERTEX: &str = "
#version 330 core
layout(location = 0) in vec3 aPos;
layout(location = 2) in vec2 aTexCoord0;
out vec2 uv;
void main() { uv = aTexCoord0; gl_Position = vec4(aPos, 1.0); }
";

pub const SCREEN_FRAGMENT: &str = "
#version 330 core
in vec2 uv;
uniform sampler2D screenTexture;
out vec4 fragColor;
void main() { fragColor = texture(screenTexture, uv); }
";
